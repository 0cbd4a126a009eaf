// JSON file store: one `<key>.json` file per key under a data directory

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use logicheck_recon::error::ReconError;
use logicheck_recon::store::KeyValueStore;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, String> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| format!("cannot create data directory {}: {}", dir.display(), e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ReconError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(store_error(key, "key must be non-empty [A-Za-z0-9_-]"));
        }
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }
}

fn store_error(key: &str, message: impl ToString) -> ReconError {
    ReconError::Store {
        key: key.to_string(),
        message: message.to_string(),
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ReconError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_error(key, e)),
        }
    }

    /// Written to a sibling temp file first, then renamed over the target.
    fn put(&mut self, key: &str, value: String) -> Result<(), ReconError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        fs::write(&tmp, value).map_err(|e| store_error(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| store_error(key, e))
    }

    fn remove(&mut self, key: &str) -> Result<(), ReconError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error(key, e)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, ReconError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| store_error("*", e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| store_error("*", e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
