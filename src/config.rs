//! Configuration file parser for `~/.config/feedkeeper/config.toml`.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields`
//! off), though we log a warning when the file contains potential typos.
//!
//! Note the distinction from [`crate::storage::SettingKey`]: fields here are
//! process-start-time only (database path, log filter, worker pool seed).
//! Runtime tunables that the scheduler and cleanup manager re-read on every
//! sweep (`update_interval`, `max_concurrent_refreshes`, ...) live in the
//! `Store`-backed settings table instead, so they can change without a
//! restart.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level process configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file (relative paths are resolved
    /// against the config directory).
    pub database_path: String,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is
    /// unset.
    pub log_filter: String,

    /// User-Agent header sent with every feed fetch.
    pub user_agent: String,

    /// Seed value written to the `max_concurrent_refreshes` setting the
    /// first time the store is opened with no prior value.
    pub default_max_concurrent_refreshes: i64,

    /// How long `Core::stop` waits for in-flight tasks to drain before
    /// abandoning them.
    pub shutdown_grace_period_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "feeds.db".to_string(),
            log_filter: "info".to_string(),
            user_agent: "feedkeeper/0.1".to_string(),
            default_max_concurrent_refreshes: 5,
            shutdown_grace_period_secs: 30,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB), matching the bound used elsewhere
    /// in this crate for untrusted file input.
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → silently accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "database_path",
                "log_filter",
                "user_agent",
                "default_max_concurrent_refreshes",
                "shutdown_grace_period_secs",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), db = %config.database_path, "Loaded configuration");
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, "feeds.db");
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.default_max_concurrent_refreshes, 5);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedkeeper_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.database_path, "feeds.db");
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("feedkeeper_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, "feeds.db");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("feedkeeper_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "log_filter = \"debug\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.database_path, "feeds.db"); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("feedkeeper_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
database_path = "custom.db"
log_filter = "debug"
user_agent = "custom-agent/1.0"
default_max_concurrent_refreshes = 10
shutdown_grace_period_secs = 60
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, "custom.db");
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.user_agent, "custom-agent/1.0");
        assert_eq!(config.default_max_concurrent_refreshes, 10);
        assert_eq!(config.shutdown_grace_period_secs, 60);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("feedkeeper_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("feedkeeper_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
database_path = "feeds.db"
totally_fake_key = "should not fail"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, "feeds.db");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedkeeper_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
