//! Diagnostic logging.
//!
//! Library code logs through `tracing` macros. The `cw` binary installs a
//! stderr subscriber filtered by the `CW_LOG` environment variable (same
//! syntax as `RUST_LOG`), defaulting to `warn`.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "CW_LOG";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
