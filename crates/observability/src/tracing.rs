//! JSON log output for the rxstock services.

use tracing_subscriber::{EnvFilter, fmt::time::SystemTime};

/// Install the global subscriber.
///
/// Events go out as JSON lines with timestamps. Verbosity comes from
/// `RUST_LOG`, defaulting to `info` when unset or unparseable. Safe to call
/// more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(SystemTime)
        .try_init();
}
