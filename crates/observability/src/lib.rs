//! Shared logging setup for queue hosts and tests.

/// Tracing subscriber configuration.
pub mod tracing;

/// Initialize process-wide structured logging.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Human-readable logs captured by the test harness.
pub fn init_for_tests() {
    tracing::init_for_tests();
}
