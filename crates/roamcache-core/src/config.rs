//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the backend URL, the reachability check URL and interval, the data
//! directory and the last used username.
//!
//! Configuration is stored at `~/.config/roamcache/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::network::DEFAULT_POLL_INTERVAL;

/// Application name used for config/data directory paths
const APP_NAME: &str = "roamcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// URL probed to decide whether the internet is reachable.
    /// Falls back to the API base URL.
    pub reachability_url: Option<String>,
    pub poll_interval_secs: u64,
    /// Where the store and session live. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            reachability_url: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            data_dir: None,
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the store and session files
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn reachability_url(&self) -> &str {
        self.reachability_url.as_deref().unwrap_or(&self.api_base_url)
    }

    /// Poll interval, never shorter than one second
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.reachability_url(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url": "https://api.example.com", "poll_interval_secs": 0}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.last_username.is_none());
    }

    #[test]
    fn test_data_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store_dir = dir.path().join("offline");
        std::fs::write(&path, serde_json::json!({ "data_dir": store_dir }).to_string()).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.data_dir().unwrap(), store_dir);

        let config = Config::default();
        if let Some(platform) = dirs::data_dir() {
            assert_eq!(config.data_dir().unwrap(), platform.join(APP_NAME));
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            last_username: Some("ana".to_string()),
            reachability_url: Some("https://status.example.com".to_string()),
            data_dir: Some(dir.path().join("data")),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
