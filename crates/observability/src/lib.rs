//! Process-wide logging setup shared by binaries and tests.

pub mod logging;

pub use logging::{LogFormat, LoggingConfig};

/// Initialize logging from the environment (`RUST_LOG`, `LOG_FORMAT`).
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    LoggingConfig::from_env().init();
}

/// Human-readable logs captured by the test harness.
pub fn init_for_tests() {
    LoggingConfig {
        filter: "debug".to_string(),
        format: LogFormat::Pretty,
    }
    .init_with_test_writer();
}
