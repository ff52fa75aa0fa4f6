//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$LAKESHORE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/lakeshore/config.toml`
//! 3. `~/.lakeshore/config.toml`
//!
//! # Validation
//!
//! Values are validated after parsing: the base URI must be HTTP(S), the
//! default prefix must be mintable, and timeouts must be non-zero.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::Prefix;

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// base_uri = "http://fedora.local/rest/prod"
/// default_prefix = "SI"
/// duplicate_policy = "warn"
///
/// [timeouts]
/// store_ms = 5000
/// index_ms = 2000
/// queue_ms = 1000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Base URI that URI-form relation targets must live under
    pub base_uri: Option<String>,

    /// Prefix used when minting without an explicit one
    pub default_prefix: Option<String>,

    /// What to do when uploaded content already exists
    pub duplicate_policy: Option<DuplicatePolicy>,

    /// Backend call limits
    pub timeouts: Option<TimeoutConfig>,
}

impl RepositoryConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.base_uri {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "base_uri '{}' must be an http(s) URI",
                    base
                )));
            }
        }

        if let Some(prefix) = &self.default_prefix {
            Prefix::new(prefix.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default_prefix: {}", e))
            })?;
        }

        if let Some(timeouts) = &self.timeouts {
            timeouts.validate()?;
        }

        Ok(())
    }
}

/// Whether duplicate content blocks ingestion or only warns.
///
/// The index can be stale, so a reported duplicate may be a false
/// positive. `Warn` keeps the check advisory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Log the owners and continue.
    #[default]
    Warn,
    /// Reject the upload with `Error::DuplicateContent`.
    Block,
}

/// Backend call limits in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Resource store get/put/delete
    pub store_ms: Option<u64>,

    /// Index queries and reindex
    pub index_ms: Option<u64>,

    /// Task enqueue
    pub queue_ms: Option<u64>,
}

impl TimeoutConfig {
    /// Validate that no limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("store_ms", self.store_ms),
            ("index_ms", self.index_ms),
            ("queue_ms", self.queue_ms),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "timeouts.{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_valid() {
        let config: RepositoryConfig = toml::from_str("").unwrap();
        assert_eq!(config, RepositoryConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_config_parses() {
        let config: RepositoryConfig = toml::from_str(
            r#"
            base_uri = "http://fedora.local/rest/prod"
            default_prefix = "SI"
            duplicate_policy = "block"

            [timeouts]
            store_ms = 100
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.duplicate_policy, Some(DuplicatePolicy::Block));
        assert_eq!(config.timeouts.unwrap().store_ms, Some(100));
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<RepositoryConfig, _> = toml::from_str("trunk = \"main\"");
        assert!(result.is_err());
    }

    #[test]
    fn non_http_base_rejected() {
        let config = RepositoryConfig {
            base_uri: Some("ftp://fedora".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_prefix_rejected() {
        let config = RepositoryConfig {
            default_prefix: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = RepositoryConfig {
            timeouts: Some(TimeoutConfig {
                index_ms: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("index_ms"));
    }

    #[test]
    fn unknown_policy_rejected() {
        let result: Result<RepositoryConfig, _> = toml::from_str("duplicate_policy = \"ignore\"");
        assert!(result.is_err());
    }
}
