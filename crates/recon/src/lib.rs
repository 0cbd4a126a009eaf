//! `logicheck-recon`: transfer manifest reconciliation engine.
//!
//! Pure engine crate: receives raw spreadsheet rows, aggregates them into
//! manifests, pairs loading/unloading legs into transfer cycles and scores
//! branch and network health. Persistence goes through [`KeyValueStore`];
//! no filesystem or CLI dependencies.

pub mod aggregate;
pub mod branch;
pub mod config;
pub mod cycle;
pub mod error;
pub mod import;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod report;
pub mod status;
pub mod store;

pub use branch::branch_stats;
pub use config::EngineConfig;
pub use cycle::derive_cycles;
pub use error::ReconError;
pub use import::{get_manifests, run_import, ImportFile, ImportOutcome, ImportReport};
pub use model::{
    BranchStats, ImportBatch, ImportMode, Manifest, ManifestStatus, NetworkStatus, PendencyType,
    Priority, RawRow, RawValue, StabilityTier, StatusLevel, TransferCycle, WorkspaceId,
};
pub use status::global_status;
pub use store::{KeyValueStore, MemoryStore};
