//! Settings file at `<home>/.lineup/config.yaml`.
//!
//! # API pattern
//!
//! - `load_at(home: &Path)` — explicit home; used in tests with `TempDir`
//! - `load()` — derives home from `dirs::home_dir()`, delegates to `load_at`
//!
//! Every field is optional in the file. Credentials are usually supplied via
//! environment variables and merged on top by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_BUCKET: &str = "avatars";
pub const DEFAULT_DELAY_MS: u64 = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Effective settings for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the remote store, e.g. `https://xyz.supabase.co`.
    pub store_url: Option<String>,
    /// Service key sent as `apikey` and bearer token.
    pub store_key: Option<String>,
    /// Storage bucket for avatars.
    pub bucket: String,
    pub youtube_api_key: Option<String>,
    /// Catalog root; relative paths resolve against the working directory.
    pub catalog_dir: PathBuf,
    /// Pause after every record, in milliseconds.
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: None,
            store_key: None,
            bucket: DEFAULT_BUCKET.to_string(),
            youtube_api_key: None,
            catalog_dir: PathBuf::from("catalog"),
            delay_ms: DEFAULT_DELAY_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn require_store_url(&self) -> Result<&str, ConfigError> {
        non_blank(self.store_url.as_deref()).ok_or(ConfigError::Missing("store_url"))
    }

    pub fn require_store_key(&self) -> Result<&str, ConfigError> {
        non_blank(self.store_key.as_deref()).ok_or(ConfigError::Missing("store_key"))
    }

    pub fn require_youtube_api_key(&self) -> Result<&str, ConfigError> {
        non_blank(self.youtube_api_key.as_deref()).ok_or(ConfigError::Missing("youtube_api_key"))
    }

    /// Copy with secrets replaced by `****`, for display.
    pub fn masked(&self) -> Settings {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "****".to_string());
        Settings {
            store_key: mask(&self.store_key),
            youtube_api_key: mask(&self.youtube_api_key),
            ..self.clone()
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `<home>/.lineup/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".lineup").join("config.yaml")
}

/// Load settings, falling back to defaults when the file does not exist.
pub fn load_at(home: &Path) -> Result<Settings, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.clone(),
        source: e,
    })?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, ConfigError> {
    load_at(&home()?)
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = load_at(tmp.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.delay(), Duration::from_millis(100));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = config_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "store_url: https://example.supabase.co\ndelay_ms: 250\n").unwrap();

        let settings = load_at(tmp.path()).unwrap();
        assert_eq!(settings.require_store_url().unwrap(), "https://example.supabase.co");
        assert_eq!(settings.delay_ms, 250);
        assert_eq!(settings.bucket, DEFAULT_BUCKET);
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let settings = Settings {
            store_key: Some("   ".to_string()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.require_store_key(),
            Err(ConfigError::Missing("store_key"))
        ));
    }

    #[test]
    fn masked_hides_secrets_only() {
        let settings = Settings {
            store_url: Some("https://x".to_string()),
            store_key: Some("secret".to_string()),
            ..Settings::default()
        };
        let masked = settings.masked();
        assert_eq!(masked.store_key.as_deref(), Some("****"));
        assert_eq!(masked.store_url.as_deref(), Some("https://x"));
        assert!(masked.youtube_api_key.is_none());
    }
}
