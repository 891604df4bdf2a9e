//! Per-test-case configuration

use crate::error::{ExpectaError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_MS: u64 = 1_000;

/// Policy knobs applied to every test case a driver runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    /// Keep executing a test case after its first recorded failure.
    ///
    /// When `false` (the default), the first failure stops the case, runs
    /// its tear-down and aborts the whole run.
    pub continue_after_failure: bool,
    /// Timeout used by waits that do not specify one, in milliseconds
    pub default_timeout_ms: u64,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            continue_after_failure: false,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl CaseConfig {
    /// Default wait timeout as a duration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            return Err(ExpectaError::config(
                "default_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_abort_on_failure() {
        let config = CaseConfig::default();
        assert!(!config.continue_after_failure);
        assert_eq!(config.default_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = CaseConfig {
            default_timeout_ms: 0,
            ..CaseConfig::default()
        };
        assert!(matches!(config.validate(), Err(ExpectaError::Config { .. })));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: CaseConfig =
            serde_json::from_str(r#"{ "continue_after_failure": true }"#).unwrap();
        assert!(config.continue_after_failure);
        assert_eq!(config.default_timeout_ms, DEFAULT_TIMEOUT_MS);
    }
}
