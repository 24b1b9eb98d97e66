use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize structured logging with environment filter.
/// Set ASHES_LOG=debug (or trace, info, warn, error) for verbosity control.
///
/// Safe to call more than once; only the first call installs a subscriber,
/// so tests can each call it without stepping on one another.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("ASHES_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    });
}
