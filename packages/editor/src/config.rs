use crate::errors::EditorResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "twodo.config.json";

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Stamped on operations that arrive without a client id
    pub client_id: String,

    /// In-memory history entries and undo levels
    pub history_limit: usize,

    /// Log entries kept per document
    pub log_retention: usize,

    pub suppression_window_ms: u64,

    /// Entries handed to a client joining late
    pub catch_up_window: usize,

    /// Directory holding one persisted log per document
    pub log_dir: String,
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults
    pub fn load(cwd: impl AsRef<Path>) -> EditorResult<Self> {
        let config_path = cwd.as_ref().join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn suppression_window(&self) -> Duration {
        Duration::from_millis(self.suppression_window_ms)
    }

    /// Absolute path to the log directory
    pub fn log_dir(&self, cwd: impl AsRef<Path>) -> PathBuf {
        cwd.as_ref().join(&self.log_dir)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            client_id: crate::manager::DEFAULT_CLIENT_ID.to_string(),
            history_limit: crate::manager::DEFAULT_HISTORY_LIMIT,
            log_retention: crate::oplog::DEFAULT_RETENTION,
            suppression_window_ms: 100,
            catch_up_window: crate::oplog::DEFAULT_CATCH_UP_WINDOW,
            log_dir: ".twodo/log".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "clientId": "laptop",
            "historyLimit": 20,
            "logDir": "state/log"
        }"#;

        let config: EditorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.client_id, "laptop");
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.log_dir, "state/log");
        assert_eq!(config.log_retention, 1000);
        assert_eq!(config.suppression_window(), Duration::from_millis(100));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig::load(dir.path()).unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.catch_up_window, 100);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{"logRetention": 5}"#).unwrap();

        let config = EditorConfig::load(dir.path()).unwrap();
        assert_eq!(config.log_retention, 5);
        assert_eq!(config.client_id, "local");
        assert_eq!(config.log_dir(dir.path()), dir.path().join(".twodo/log"));
    }
}
