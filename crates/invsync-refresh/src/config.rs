//! Refresh configuration.

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{RefreshError, RefreshResult};

/// Orphan candidates are looked up this many natural keys at a time.
pub const DEFAULT_ORPHAN_BATCH_SIZE: usize = 100;

/// Pass-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Natural keys per orphan candidate query.
    #[serde(default = "default_orphan_batch_size")]
    pub orphan_batch_size: usize,
    /// Skip saves whose attributes did not change. Collections may override.
    #[serde(default = "default_true")]
    pub check_changed: bool,
    /// Delete records of complete collections that were not observed.
    #[serde(default = "default_true")]
    pub delete_missing: bool,
}

fn default_orphan_batch_size() -> usize {
    DEFAULT_ORPHAN_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            orphan_batch_size: default_orphan_batch_size(),
            check_changed: true,
            delete_missing: true,
        }
    }
}

impl RefreshConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `INVSYNC_ORPHAN_BATCH_SIZE`: positive integer (default: 100)
    /// - `INVSYNC_CHECK_CHANGED`: `true` (default) or `false`
    /// - `INVSYNC_DELETE_MISSING`: `true` (default) or `false`
    pub fn from_env() -> RefreshResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = env::var("INVSYNC_ORPHAN_BATCH_SIZE") {
            config.orphan_batch_size = match value.parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => return Err(invalid("INVSYNC_ORPHAN_BATCH_SIZE", &value)),
            };
        }
        if let Ok(value) = env::var("INVSYNC_CHECK_CHANGED") {
            config.check_changed = parse_bool("INVSYNC_CHECK_CHANGED", &value)?;
        }
        if let Ok(value) = env::var("INVSYNC_DELETE_MISSING") {
            config.delete_missing = parse_bool("INVSYNC_DELETE_MISSING", &value)?;
        }

        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> RefreshResult<()> {
        if self.orphan_batch_size == 0 {
            return Err(RefreshError::configuration(
                "orphan_batch_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_bool(var: &str, value: &str) -> RefreshResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(var, value)),
    }
}

fn invalid(var: &str, value: &str) -> RefreshError {
    RefreshError::configuration(format!("{var} has invalid value '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RefreshConfig::default();
        assert_eq!(config.orphan_batch_size, 100);
        assert!(config.check_changed);
        assert!(config.delete_missing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: RefreshConfig = serde_json::from_str(r#"{"check_changed": false}"#).unwrap();
        assert_eq!(config.orphan_batch_size, DEFAULT_ORPHAN_BATCH_SIZE);
        assert!(!config.check_changed);
        assert!(config.delete_missing);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = RefreshConfig {
            orphan_batch_size: 0,
            ..RefreshConfig::default()
        };
        assert!(config.validate().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
