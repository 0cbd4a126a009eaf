//! Persistence seam. The engine only sees an opaque key-value store of JSON
//! blobs; collections are always read and written whole.

use std::collections::BTreeMap;

use crate::error::ReconError;
use crate::merge::decode_manifests;
use crate::model::{ImportBatch, Manifest, WorkspaceId};

pub const MANIFESTS_PREFIX: &str = "logicheck_manifests";
pub const HISTORY_PREFIX: &str = "logicheck_history";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, ReconError>;
    fn put(&mut self, key: &str, value: String) -> Result<(), ReconError>;
    fn remove(&mut self, key: &str) -> Result<(), ReconError>;
    fn keys(&self) -> Result<Vec<String>, ReconError>;
}

/// In-process store, used by tests and embedders that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ReconError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: String) -> Result<(), ReconError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), ReconError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, ReconError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

pub fn manifests_key(workspace: &WorkspaceId) -> String {
    format!("{MANIFESTS_PREFIX}_{workspace}")
}

pub fn history_key(workspace: &WorkspaceId) -> String {
    format!("{HISTORY_PREFIX}_{workspace}")
}

// ---------------------------------------------------------------------------
// Workspace-scoped collections
// ---------------------------------------------------------------------------

pub fn load_manifests(
    store: &dyn KeyValueStore,
    workspace: &WorkspaceId,
) -> Result<Vec<Manifest>, ReconError> {
    Ok(store
        .get(&manifests_key(workspace))?
        .map(|blob| decode_manifests(&blob))
        .unwrap_or_default())
}

pub fn save_manifests(
    store: &mut dyn KeyValueStore,
    workspace: &WorkspaceId,
    manifests: &[Manifest],
) -> Result<(), ReconError> {
    let blob = serde_json::to_string(manifests).map_err(|e| ReconError::Serialize(e.to_string()))?;
    store.put(&manifests_key(workspace), blob)
}

/// Import history. An unreadable history is treated as empty.
pub fn load_history(
    store: &dyn KeyValueStore,
    workspace: &WorkspaceId,
) -> Result<Vec<ImportBatch>, ReconError> {
    let Some(blob) = store.get(&history_key(workspace))? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&blob) {
        Ok(history) => Ok(history),
        Err(e) => {
            log::warn!("discarding unreadable import history for workspace {workspace}: {e}");
            Ok(Vec::new())
        }
    }
}

pub fn save_history(
    store: &mut dyn KeyValueStore,
    workspace: &WorkspaceId,
    history: &[ImportBatch],
) -> Result<(), ReconError> {
    let blob = serde_json::to_string(history).map_err(|e| ReconError::Serialize(e.to_string()))?;
    store.put(&history_key(workspace), blob)
}

/// Write manifests and history as one unit. When the history write fails
/// the previous manifests blob is put back before the error is returned.
pub fn save_collections(
    store: &mut dyn KeyValueStore,
    workspace: &WorkspaceId,
    manifests: &[Manifest],
    history: &[ImportBatch],
) -> Result<(), ReconError> {
    let key = manifests_key(workspace);
    let previous = store.get(&key)?;
    save_manifests(store, workspace, manifests)?;

    if let Err(err) = save_history(store, workspace, history) {
        let restored = match previous {
            Some(blob) => store.put(&key, blob),
            None => store.remove(&key),
        };
        if let Err(restore_err) = restored {
            log::error!("failed to restore manifests for workspace {workspace}: {restore_err}");
        }
        return Err(err);
    }
    Ok(())
}

/// Drop every collection scoped to `workspace`.
pub fn clear_workspace(
    store: &mut dyn KeyValueStore,
    workspace: &WorkspaceId,
) -> Result<(), ReconError> {
    store.remove(&manifests_key(workspace))?;
    store.remove(&history_key(workspace))
}
