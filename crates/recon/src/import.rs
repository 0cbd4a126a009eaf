//! Import orchestration: raw rows per file -> manifests -> merged collection.
//!
//! Files are processed sequentially and in isolation; one unreadable file
//! never aborts the others. The stored collection is only swapped when at
//! least one manifest was produced.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{aggregate_manifests, BatchContext};
use crate::config::EngineConfig;
use crate::error::ReconError;
use crate::merge::merge_manifests;
use crate::model::{ImportBatch, ImportMode, Manifest, RawRow, WorkspaceId};
use crate::normalize::{is_manifest_file, normalize_rows};
use crate::store::{
    clear_workspace, load_history, load_manifests, save_collections, save_manifests, KeyValueStore,
};

/// One uploaded file. `rows` carries the reader's failure, if any.
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub name: String,
    pub rows: Result<Vec<RawRow>, String>,
}

impl ImportFile {
    pub fn new(name: impl Into<String>, rows: Vec<RawRow>) -> Self {
        Self {
            name: name.into(),
            rows: Ok(rows),
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Err(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ImportOutcome {
    Imported {
        /// Manifests produced by this import.
        manifests: usize,
        /// Size of the stored collection afterwards.
        stored: usize,
    },
    NothingImported,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub outcome: ImportOutcome,
    pub batches: Vec<ImportBatch>,
    pub failures: Vec<FileFailure>,
    /// Files that were read but held no manifest rows.
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

pub fn run_import(
    store: &mut dyn KeyValueStore,
    workspace: &WorkspaceId,
    files: Vec<ImportFile>,
    mode: ImportMode,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<ImportReport, ReconError> {
    let mut batches = Vec::new();
    let mut failures = Vec::new();
    let mut skipped = Vec::new();
    let mut incoming: Vec<Manifest> = Vec::new();

    for file in files {
        let rows = match file.rows {
            Ok(rows) => rows,
            Err(message) => {
                log::warn!("import: failed to read {}: {message}", file.name);
                failures.push(FileFailure {
                    file_name: file.name,
                    message,
                });
                continue;
            }
        };

        if !is_manifest_file(&rows, &config.aliases) {
            log::info!("import: {} has no manifest columns, skipped", file.name);
            skipped.push(file.name);
            continue;
        }

        let normalized = normalize_rows(&rows, &config.aliases);
        if normalized.is_empty() {
            log::info!("import: {} has no usable rows, skipped", file.name);
            skipped.push(file.name);
            continue;
        }

        let batch = BatchContext {
            import_id: Uuid::new_v4().to_string(),
            processed_at: now,
        };
        let manifests = aggregate_manifests(&normalized, &batch, config);
        log::debug!(
            "import: {} -> {} row(s), {} manifest(s)",
            file.name,
            normalized.len(),
            manifests.len()
        );

        batches.push(ImportBatch {
            id: batch.import_id,
            file_name: file.name,
            timestamp: now,
            record_count: normalized.len(),
            manifest_count: manifests.len(),
        });
        // later files in the same action win on identical keys
        incoming = merge_manifests(incoming, manifests, ImportMode::Accumulate);
    }

    if incoming.is_empty() {
        log::info!(
            "import: nothing imported ({} failed, {} skipped)",
            failures.len(),
            skipped.len()
        );
        return Ok(ImportReport {
            outcome: ImportOutcome::NothingImported,
            batches,
            failures,
            skipped,
        });
    }

    let produced = incoming.len();
    let existing = match mode {
        ImportMode::Accumulate => load_manifests(store, workspace)?,
        ImportMode::Replace => Vec::new(),
    };
    let merged = merge_manifests(existing, incoming, mode);

    let mut history = match mode {
        ImportMode::Accumulate => load_history(store, workspace)?,
        ImportMode::Replace => Vec::new(),
    };
    history.extend(batches.iter().cloned());
    save_collections(store, workspace, &merged, &history)?;

    log::info!(
        "import ({mode:?}): {} file(s), {produced} manifest(s) produced, {} stored",
        batches.len(),
        merged.len()
    );

    Ok(ImportReport {
        outcome: ImportOutcome::Imported {
            manifests: produced,
            stored: merged.len(),
        },
        batches,
        failures,
        skipped,
    })
}

// ---------------------------------------------------------------------------
// Batch bookkeeping
// ---------------------------------------------------------------------------

pub fn get_manifests(
    store: &dyn KeyValueStore,
    workspace: &WorkspaceId,
) -> Result<Vec<Manifest>, ReconError> {
    load_manifests(store, workspace)
}

/// Manifests whose batch is unknown to the history (or that carry none).
pub fn orphaned_count(manifests: &[Manifest], history: &[ImportBatch]) -> usize {
    let known: HashSet<&str> = history.iter().map(|b| b.id.as_str()).collect();
    manifests.iter().filter(|m| is_orphan(m, &known)).count()
}

fn is_orphan(m: &Manifest, known: &HashSet<&str>) -> bool {
    m.import_id.as_deref().map_or(true, |id| !known.contains(id))
}

/// Drop orphaned manifests. Returns how many were removed.
pub fn delete_orphans(
    store: &mut dyn KeyValueStore,
    workspace: &WorkspaceId,
) -> Result<usize, ReconError> {
    let history = load_history(store, workspace)?;
    let known: HashSet<&str> = history.iter().map(|b| b.id.as_str()).collect();

    let mut manifests = load_manifests(store, workspace)?;
    let before = manifests.len();
    manifests.retain(|m| !is_orphan(m, &known));
    let removed = before - manifests.len();

    if removed > 0 {
        save_manifests(store, workspace, &manifests)?;
        log::info!("removed {removed} orphaned manifest(s) from workspace {workspace}");
    }
    Ok(removed)
}

/// Remove one batch from history along with the manifests it produced.
/// Returns the number of manifests removed.
pub fn delete_batch(
    store: &mut dyn KeyValueStore,
    workspace: &WorkspaceId,
    batch_id: &str,
) -> Result<usize, ReconError> {
    let mut history = load_history(store, workspace)?;
    history.retain(|b| b.id != batch_id);

    let mut manifests = load_manifests(store, workspace)?;
    let before = manifests.len();
    manifests.retain(|m| m.import_id.as_deref() != Some(batch_id));
    let removed = before - manifests.len();
    save_collections(store, workspace, &manifests, &history)?;

    log::info!("deleted batch {batch_id} ({removed} manifest(s)) from workspace {workspace}");
    Ok(removed)
}

pub fn reset_workspace(
    store: &mut dyn KeyValueStore,
    workspace: &WorkspaceId,
) -> Result<(), ReconError> {
    clear_workspace(store, workspace)?;
    log::warn!("workspace {workspace} reset");
    Ok(())
}
