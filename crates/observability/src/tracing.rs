//! Tracing initialization.
//!
//! Queue components log with structured fields (`queue`, `item_id`,
//! `position`, `error`); `RUST_LOG` selects what is emitted, e.g.
//! `RUST_LOG=sspr_queue=debug,sspr_storage=warn`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// JSON logs with timestamps, one object per line.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(DEFAULT_FILTER))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_thread_names(true)
        .try_init();
}

/// Compact logs routed through the libtest capture.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .with_thread_names(true)
        .try_init();
}
