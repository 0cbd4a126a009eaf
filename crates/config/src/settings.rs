// User settings
// Loaded from ~/.config/logicheck/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use logicheck_recon::config::EngineConfig;
use logicheck_recon::error::ReconError;
use logicheck_recon::model::{ImportMode, WorkspaceId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Workspace
    /// Scope for every persisted collection. Created on first use.
    #[serde(rename = "workspace.id")]
    pub workspace_id: Option<String>,

    // Storage
    #[serde(rename = "storage.dataDir")]
    pub data_dir: Option<PathBuf>,  // None = platform data dir

    // Import
    #[serde(rename = "import.mode")]
    pub import_mode: ImportMode,

    // Engine
    #[serde(rename = "engine.configPath")]
    pub engine_config: Option<PathBuf>,  // None = built-in defaults
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace_id: None,
            data_dir: None,
            import_mode: ImportMode::Accumulate,
            engine_config: None,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("logicheck");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path. Missing or malformed files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => {
                // Strip comments (lines starting with //)
                let cleaned: String = contents
                    .lines()
                    .filter(|line| !line.trim().starts_with("//"))
                    .collect::<Vec<_>>()
                    .join("\n");

                match serde_json::from_str(&cleaned) {
                    Ok(settings) => settings,
                    Err(e) => {
                        log::warn!("error parsing {}: {e}; using default settings", path.display());
                        Self::default()
                    }
                }
            }
            Err(e) => {
                log::warn!("error reading {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("error creating config directory: {e}");
                return;
            }
        }

        let default_config = r#"{
    // Workspace (generated on first import, rotate to start over)
    "workspace.id": null,

    // Storage directory for imported manifests (null = platform data dir)
    "storage.dataDir": null,

    // Import mode: "accumulate" merges by manifest key, "replace" discards prior data
    "import.mode": "accumulate",

    // Path to an engine TOML file (aliases, tokens, thresholds); null = built-in
    "engine.configPath": null
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("error writing default settings.json: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Workspace lifecycle
    // -----------------------------------------------------------------------

    /// Current workspace, creating one if none is set. Caller saves.
    pub fn ensure_workspace_id(&mut self) -> WorkspaceId {
        match self.workspace_id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(id) => WorkspaceId::new(id),
            None => self.rotate_workspace(),
        }
    }

    /// Switch to a fresh workspace. Data under the old id is left in place.
    pub fn rotate_workspace(&mut self) -> WorkspaceId {
        let id = uuid::Uuid::new_v4().to_string();
        log::info!("new workspace {id}");
        self.workspace_id = Some(id.clone());
        WorkspaceId::new(id)
    }

    /// Directory holding persisted collections.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("logicheck")
        })
    }

    /// Engine config from `engine.configPath`, or the built-in defaults.
    pub fn engine_config(&self) -> Result<EngineConfig, ReconError> {
        let Some(path) = &self.engine_config else {
            return Ok(EngineConfig::default());
        };
        let input = fs::read_to_string(path)
            .map_err(|e| ReconError::ConfigParse(format!("{}: {e}", path.display())))?;
        EngineConfig::from_toml(&input)
    }
}
