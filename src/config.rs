//! Engine configuration, loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! in-memory setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Content root; quest files live under `<data_dir>/quests`
    pub data_dir: PathBuf,
    /// Owner of the mirrored progress records
    pub user_id: String,
    /// Default tracing directive, combined with `RUST_LOG`
    pub log_filter: String,
    /// Watch quest files and reload on change
    pub hot_reload: bool,
    /// Quests registered at session start if not restored
    pub starting_quests: Vec<String>,
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            user_id: "local".to_string(),
            log_filter: "quest_progression=info".to_string(),
            hot_reload: false,
            starting_quests: Vec::new(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: "sqlite:progress.db?mode=rwc".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        Self::from_toml(&content).map_err(|e| format!("Failed to parse config {:?}: {}", path, e))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(
            &path,
            r#"
user_id = "player-7"
hot_reload = true
starting_quests = ["kill_goblin", "survive_60s"]

[store]
backend = "sqlite"
database_url = "sqlite::memory:"
"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.user_id, "player-7");
        assert!(config.hot_reload);
        assert_eq!(config.starting_quests.len(), 2);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.database_url, "sqlite::memory:");
        // Untouched fields keep their defaults
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = EngineConfig::from_toml("[store]\nbackend = \"postgres\"");
        assert!(err.is_err());
        assert!(EngineConfig::load(Path::new("/nonexistent/engine.toml")).is_err());
    }
}
