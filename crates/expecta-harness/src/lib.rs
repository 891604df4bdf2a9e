//! Expecta harness
//!
//! Adapters around the `expecta` engine for running suites from a binary:
//! an ordered [`Suite`] driver with the abort policy, [`HarnessConfig`]
//! loading from TOML and the environment, tracing setup, and the output
//! checker behind the `expecta-check` binary.

pub mod check;
pub mod config;
pub mod error;
pub mod logging;
pub mod suite;

pub use check::{compare, compare_files, CheckError, DEFAULT_CHECK_PREFIX};
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use suite::{exit_on_abort, Suite, SuiteOutcome};
