//! Tracing subscriber setup for suite binaries

use crate::config::ENV_LOG;
use crate::error::{HarnessError, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber
///
/// `EXPECTA_LOG` takes precedence over `filter`. Failures are written to
/// stderr so they stay separate from output checked by `expecta-check`.
pub fn init(filter: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_env(ENV_LOG) {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter).map_err(|e| HarnessError::Logging {
            message: format!("invalid filter '{filter}': {e}"),
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| HarnessError::Logging {
            message: e.to_string(),
        })
}
