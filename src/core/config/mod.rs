//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$LAKESHORE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/lakeshore/config.toml`
//! 3. `~/.lakeshore/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use lakeshore::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("Duplicate policy: {:?}", config.duplicate_policy());
//! println!("Store timeout: {:?}", config.timeouts().store);
//! ```

pub mod schema;

pub use schema::{DuplicatePolicy, RepositoryConfig, TimeoutConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Default limit for every backend call.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to serialize config: {0}")]
    SerializeError(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Resolved backend call limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Resource store calls.
    pub store: Duration,
    /// Index calls.
    pub index: Duration,
    /// Task queue calls.
    pub queue: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let limit = Duration::from_millis(DEFAULT_TIMEOUT_MS);
        Self {
            store: limit,
            index: limit,
            queue: limit,
        }
    }
}

impl Timeouts {
    /// The same limit for every backend.
    pub fn uniform(limit: Duration) -> Self {
        Self {
            store: limit,
            index: limit,
            queue: limit,
        }
    }
}

/// Loaded configuration with accessors that apply defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Values read from the config file
    pub file: RepositoryConfig,
    /// Path the file was read from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: RepositoryConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        file.validate()?;

        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Build a config from already-parsed values.
    pub fn from_file(file: RepositoryConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Self { file, path: None })
    }

    /// Locate the config file, honoring the search order.
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LAKESHORE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("lakeshore/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".lakeshore/config.toml"))
            .filter(|path| path.exists())
    }

    /// Path the configuration was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Base URI for URI-form relation targets.
    pub fn base_uri(&self) -> Option<&str> {
        self.file.base_uri.as_deref()
    }

    /// Prefix used when none is given.
    pub fn default_prefix(&self) -> Option<&str> {
        self.file.default_prefix.as_deref()
    }

    /// Duplicate policy (default: warn).
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.file.duplicate_policy.unwrap_or_default()
    }

    /// Backend call limits with defaults applied.
    pub fn timeouts(&self) -> Timeouts {
        let t = self.file.timeouts.clone().unwrap_or_default();
        let ms = |v: Option<u64>| Duration::from_millis(v.unwrap_or(DEFAULT_TIMEOUT_MS));
        Timeouts {
            store: ms(t.store_ms),
            index: ms(t.index_ms),
            queue: ms(t.queue_ms),
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let timeouts = self.timeouts();
        let effective = RepositoryConfig {
            base_uri: self.file.base_uri.clone(),
            default_prefix: self.file.default_prefix.clone(),
            duplicate_policy: Some(self.duplicate_policy()),
            timeouts: Some(TimeoutConfig {
                store_ms: Some(timeouts.store.as_millis() as u64),
                index_ms: Some(timeouts.index.as_millis() as u64),
                queue_ms: Some(timeouts.queue.as_millis() as u64),
            }),
        };
        toml::to_string_pretty(&effective).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.duplicate_policy(), DuplicatePolicy::Warn);
        assert_eq!(config.timeouts(), Timeouts::default());
        assert!(config.base_uri().is_none());
    }

    #[test]
    fn load_from_applies_values() {
        let file = write_config(
            r#"
            base_uri = "https://repo.example/rest"
            duplicate_policy = "block"

            [timeouts]
            index_ms = 250
            "#,
        );
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.base_uri(), Some("https://repo.example/rest"));
        assert_eq!(config.duplicate_policy(), DuplicatePolicy::Block);
        assert_eq!(config.timeouts().index, Duration::from_millis(250));
        assert_eq!(
            config.timeouts().store,
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        );
        assert_eq!(config.path(), Some(file.path()));
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let file = write_config("duplicate_policy = ");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn load_from_validates() {
        let file = write_config("default_prefix = \"\"");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Config::load_from(Path::new("/nonexistent/lakeshore.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn effective_toml_round_trips() {
        let config = Config::from_file(RepositoryConfig {
            default_prefix: Some("SI".into()),
            ..Default::default()
        })
        .unwrap();
        let rendered = config.to_toml().unwrap();
        let parsed: RepositoryConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.default_prefix.as_deref(), Some("SI"));
        assert_eq!(parsed.duplicate_policy, Some(DuplicatePolicy::Warn));
        assert_eq!(parsed.timeouts.unwrap().queue_ms, Some(DEFAULT_TIMEOUT_MS));
    }
}
