//! Configuration management for Karuku.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Karuku.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Save defaults
    pub save: SaveConfig,

    /// Background load settings
    pub load: LoadConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Save retry settings
    pub retry: RetryConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.karuku.karuku/config.toml
    /// - Linux: ~/.config/karuku/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\karuku\karuku\config\config.toml
    ///
    /// Falls back to ~/.karuku/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "karuku", "karuku")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".karuku").join("config.toml")
            })
    }

    /// Default output directory with `~` expanded, if one is configured.
    pub fn output_dir(&self) -> Option<PathBuf> {
        let raw = self.save.output_dir.trim();
        if raw.is_empty() {
            return None;
        }
        Some(PathBuf::from(shellexpand::tilde(raw).into_owned()))
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::ExifMode;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.save.quality, 85);
        assert_eq!(config.save.format, "auto");
        assert_eq!(config.load.queue_capacity, 8);
        assert_eq!(config.load.poll_batch, 30);
        assert_eq!(config.retry.max_attempts, 2);
        assert!(!config.retry.allow_retry);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[save]"));
        assert!(toml.contains("[load]"));
        assert!(toml.contains("[retry]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[save]\nquality = 70\nexif_mode = \"remove\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.save.quality, 70);
        assert_eq!(config.save.exif_mode, ExifMode::Remove);
        assert_eq!(config.save.webp_method, 6);
        assert_eq!(config.load.max_files, 600);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[load]\nqueue_capacity = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_output_dir_expands_tilde() {
        let mut config = Config::default();
        assert!(config.output_dir().is_none());

        config.save.output_dir = "~/resized".to_string();
        let dir = config.output_dir().unwrap();
        assert!(!dir.to_string_lossy().starts_with('~'));
        assert!(dir.ends_with("resized"));
    }
}
