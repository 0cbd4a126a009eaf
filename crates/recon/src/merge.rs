use std::collections::HashMap;

use crate::model::{ImportMode, Manifest, ManifestKey};

/// Merge a freshly aggregated set into the existing collection.
///
/// `Replace` keeps only `incoming`. `Accumulate` upserts by key: a colliding
/// manifest is overwritten as a whole (no field-level merge), existing
/// order is kept, and new keys are appended in incoming order. Duplicate
/// keys inside `incoming` resolve last-write-wins.
pub fn merge_manifests(
    existing: Vec<Manifest>,
    incoming: Vec<Manifest>,
    mode: ImportMode,
) -> Vec<Manifest> {
    let base = match mode {
        ImportMode::Replace => Vec::new(),
        ImportMode::Accumulate => existing,
    };
    upsert_all(base, incoming)
}

fn upsert_all(mut merged: Vec<Manifest>, incoming: Vec<Manifest>) -> Vec<Manifest> {
    let mut index: HashMap<ManifestKey, usize> = HashMap::with_capacity(merged.len());
    for (i, m) in merged.iter().enumerate() {
        index.insert(m.key(), i);
    }

    for m in incoming {
        let key = m.key();
        match index.get(&key) {
            Some(&i) => merged[i] = m,
            None => {
                index.insert(key, merged.len());
                merged.push(m);
            }
        }
    }
    merged
}

/// Decode a persisted manifest collection, applying the migration guard.
///
/// Blobs written by an older schema (any element without `originBranch`)
/// or blobs that no longer decode are treated as an empty collection so
/// the next import starts clean instead of mixing shapes.
pub fn decode_manifests(blob: &str) -> Vec<Manifest> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(blob) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("discarding unreadable manifest collection: {e}");
            return Vec::new();
        }
    };

    let legacy = values
        .iter()
        .filter(|v| v.get("originBranch").is_none())
        .count();
    if legacy > 0 {
        log::warn!(
            "discarding {} stored manifest(s): {legacy} predate the originBranch field",
            values.len()
        );
        return Vec::new();
    }

    let mut manifests = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<Manifest>(value) {
            Ok(m) => manifests.push(m),
            Err(e) => {
                log::warn!("discarding stored manifest collection, schema mismatch: {e}");
                return Vec::new();
            }
        }
    }
    manifests
}
