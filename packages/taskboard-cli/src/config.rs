/// Configuration for the taskboard CLI.
/// Reads config.json from ~/.config/taskboard/config.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taskboard_core::SyncConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Where board records and sync settings live.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl CliConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Default config path: ~/.config/taskboard/config.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("config.json")
}

/// Default data dir: ~/.local/share/taskboard
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
}

/// Load config from path. Returns default if file doesn't exist.
pub fn load_config(path: &Path) -> CliConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Failed to parse config {}: {}", path.display(), e);
            CliConfig::default()
        }),
        Err(_) => {
            log::info!("No config at {}, using defaults", path.display());
            CliConfig::default()
        }
    }
}
