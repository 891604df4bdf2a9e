//! Logging setup for tests of code built on Expecta

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging at `debug`, honoring `EXPECTA_LOG` when set.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init_test_logging() {
    init_test_logging_with_filter("expecta=debug");
}

/// Initialize test logging with a fallback filter directive.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_filter(fallback: &str) {
    INIT_LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_env("EXPECTA_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(true)
            .try_init();
    });
}
