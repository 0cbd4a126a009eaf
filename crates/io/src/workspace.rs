// Workspace facade: files on disk -> engine -> JSON store

use std::path::Path;

use chrono::{DateTime, Utc};

use logicheck_config::Settings;
use logicheck_recon::branch::branch_stats;
use logicheck_recon::config::EngineConfig;
use logicheck_recon::cycle::derive_cycles;
use logicheck_recon::error::ReconError;
use logicheck_recon::import::{self, run_import, ImportFile, ImportReport};
use logicheck_recon::model::{
    BranchStats, ImportBatch, ImportMode, Manifest, NetworkStatus, TransferCycle, WorkspaceId,
};
use logicheck_recon::report::{manifest_overview, network_summary, ManifestOverview, NetworkSummary};
use logicheck_recon::status::global_status;
use logicheck_recon::store::load_history;

use crate::store::JsonFileStore;

/// One workspace's persisted manifests plus the engine config that reads them.
///
/// Derived views (cycles, branch stats, status) are recomputed from the
/// stored manifests on every call.
pub struct Workspace {
    store: JsonFileStore,
    id: WorkspaceId,
    config: EngineConfig,
    mode: ImportMode,
}

impl Workspace {
    pub fn new(store: JsonFileStore, id: WorkspaceId, config: EngineConfig) -> Self {
        Self {
            store,
            id,
            config,
            mode: ImportMode::default(),
        }
    }

    /// Open the workspace named by `settings`, creating a workspace id when
    /// none exists yet. The caller persists `settings` afterwards.
    pub fn open(settings: &mut Settings) -> Result<Self, ReconError> {
        let id = settings.ensure_workspace_id();
        let config = settings.engine_config()?;
        let dir = settings.data_dir();
        let store = JsonFileStore::open(&dir).map_err(|message| ReconError::Store {
            key: dir.display().to_string(),
            message,
        })?;
        log::info!("workspace {id} at {}", dir.display());

        let mut workspace = Self::new(store, id, config);
        workspace.mode = settings.import_mode;
        Ok(workspace)
    }

    pub fn id(&self) -> &WorkspaceId {
        &self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn import_mode(&self) -> ImportMode {
        self.mode
    }

    pub fn set_import_mode(&mut self, mode: ImportMode) {
        self.mode = mode;
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    /// Read and import `paths` with the current mode. Unreadable files are
    /// reported in the result, never raised.
    pub fn import_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<ImportReport, ReconError> {
        self.import_paths_at(paths, Utc::now())
    }

    pub fn import_paths_at<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        now: DateTime<Utc>,
    ) -> Result<ImportReport, ReconError> {
        let files: Vec<ImportFile> = paths
            .iter()
            .map(|p| {
                let path = p.as_ref();
                ImportFile {
                    name: file_name(path),
                    rows: crate::read_rows(path),
                }
            })
            .collect();
        run_import(&mut self.store, &self.id, files, self.mode, &self.config, now)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn manifests(&self) -> Result<Vec<Manifest>, ReconError> {
        import::get_manifests(&self.store, &self.id)
    }

    pub fn history(&self) -> Result<Vec<ImportBatch>, ReconError> {
        load_history(&self.store, &self.id)
    }

    pub fn cycles(&self, now: DateTime<Utc>) -> Result<Vec<TransferCycle>, ReconError> {
        Ok(derive_cycles(&self.manifests()?, now, &self.config))
    }

    pub fn branch_stats(&self, now: DateTime<Utc>) -> Result<Vec<BranchStats>, ReconError> {
        Ok(branch_stats(&self.cycles(now)?, &self.config.health))
    }

    pub fn status(&self, now: DateTime<Utc>) -> Result<NetworkStatus, ReconError> {
        Ok(global_status(&self.cycles(now)?, &self.config.network))
    }

    pub fn summary(&self, now: DateTime<Utc>) -> Result<NetworkSummary, ReconError> {
        Ok(network_summary(&self.cycles(now)?, &self.config.network))
    }

    pub fn overview(&self) -> Result<ManifestOverview, ReconError> {
        Ok(manifest_overview(&self.manifests()?))
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    pub fn orphaned_count(&self) -> Result<usize, ReconError> {
        Ok(import::orphaned_count(&self.manifests()?, &self.history()?))
    }

    pub fn delete_orphans(&mut self) -> Result<usize, ReconError> {
        import::delete_orphans(&mut self.store, &self.id)
    }

    pub fn delete_batch(&mut self, batch_id: &str) -> Result<usize, ReconError> {
        import::delete_batch(&mut self.store, &self.id, batch_id)
    }

    pub fn reset(&mut self) -> Result<(), ReconError> {
        import::reset_workspace(&mut self.store, &self.id)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
