//! Error type for framework usage violations
//!
//! Test failures are never errors: assertions, timeouts and uncaught body
//! errors are recorded on the [`TestRun`](crate::TestRun). `ExpectaError`
//! covers the cases where the framework itself was driven incorrectly and
//! no valid run exists to record into.

/// Framework usage and configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpectaError {
    /// An API that needs the current test was called outside of one
    #[error("No active test: {message}")]
    NoActiveTest {
        /// What was attempted without a running test case
        message: String,
    },

    /// A wait started while another wait was still blocking
    #[error("Re-entrant wait in test case '{test}'")]
    ReentrantWait {
        /// Name of the test case owning the registry
        test: String,
    },

    /// A wait was called from a thread other than the test thread
    #[error("Wait called off the test thread of test case '{test}'")]
    WaitOffTestThread {
        /// Name of the test case owning the context
        test: String,
    },

    /// An expectation was handed to a wait of a different test case
    #[error("Expectation '{description}' does not belong to test case '{test}'")]
    ForeignExpectation {
        /// Description of the offending expectation
        description: String,
        /// Name of the test case that performed the wait
        test: String,
    },

    /// `perform` was called on a test case that already left `Idle`
    #[error("Test case '{test}' has already been performed")]
    AlreadyPerformed {
        /// Name of the test case
        test: String,
    },

    /// The run recorder was used outside of its start/stop window
    #[error("Test run '{test}' is not recording: {message}")]
    RunNotActive {
        /// Name of the test case owning the run
        test: String,
        /// Which recorder invariant was violated
        message: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message describing the invalid value
        message: String,
    },
}

impl ExpectaError {
    /// Create a no-active-test error
    pub fn no_active_test(message: impl Into<String>) -> Self {
        Self::NoActiveTest {
            message: message.into(),
        }
    }

    /// Create a run-not-active error
    pub fn run_not_active(test: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RunNotActive {
            test: test.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error invalidates the whole run and must abort it
    pub fn is_usage_violation(&self) -> bool {
        matches!(
            self,
            Self::NoActiveTest { .. }
                | Self::ReentrantWait { .. }
                | Self::WaitOffTestThread { .. }
                | Self::ForeignExpectation { .. }
                | Self::AlreadyPerformed { .. }
        )
    }
}

/// Standard Result type for Expecta operations
pub type Result<T> = std::result::Result<T, ExpectaError>;
