//! Harness configuration
//!
//! Loaded from a TOML file, then overridden by `EXPECTA_*` environment
//! variables, then validated:
//!
//! ```toml
//! log_filter = "expecta=debug"
//!
//! [case]
//! continue_after_failure = false
//! default_timeout_ms = 1000
//! ```

use crate::error::{HarnessError, Result};
use expecta::{CaseConfig, ExpectaError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding the log filter
pub const ENV_LOG: &str = "EXPECTA_LOG";
/// Environment variable overriding `case.continue_after_failure`
pub const ENV_CONTINUE_AFTER_FAILURE: &str = "EXPECTA_CONTINUE_AFTER_FAILURE";
/// Environment variable overriding `case.default_timeout_ms`
pub const ENV_DEFAULT_TIMEOUT_MS: &str = "EXPECTA_DEFAULT_TIMEOUT_MS";

/// Settings for a suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    /// Defaults applied to every test case of the suite
    pub case: CaseConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            case: CaseConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        toml::from_str(&content).map_err(|source| HarnessError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` when given (defaults otherwise), apply environment
    /// overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables
    pub fn merge_with_env(&mut self) -> Result<()> {
        if let Ok(filter) = std::env::var(ENV_LOG) {
            self.log_filter = filter;
        }
        if let Ok(value) = std::env::var(ENV_CONTINUE_AFTER_FAILURE) {
            self.case.continue_after_failure = parse_bool(ENV_CONTINUE_AFTER_FAILURE, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_DEFAULT_TIMEOUT_MS) {
            self.case.default_timeout_ms = value.trim().parse().map_err(|e| {
                ExpectaError::config(format!("{ENV_DEFAULT_TIMEOUT_MS}={value}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.log_filter.trim().is_empty() {
            return Err(ExpectaError::config("log_filter must not be empty").into());
        }
        self.case.validate()?;
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> std::result::Result<bool, ExpectaError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ExpectaError::config(format!(
            "{key}={other}: expected a boolean"
        ))),
    }
}
