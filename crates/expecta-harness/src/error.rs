//! Harness error type

use std::path::PathBuf;

/// Errors raised by the harness adapters
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML for the expected schema
    #[error("Invalid config file {path}: {source}")]
    Parse {
        /// File that was being parsed
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },

    /// A configuration value failed validation
    #[error(transparent)]
    Config(#[from] expecta::ExpectaError),

    /// The logging subscriber could not be installed
    #[error("Failed to initialize logging: {message}")]
    Logging {
        /// Error message from the subscriber
        message: String,
    },

    /// Actual output did not satisfy the expected check lines
    #[error(transparent)]
    Check(#[from] crate::check::CheckError),
}

impl HarnessError {
    /// Create an I/O error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
