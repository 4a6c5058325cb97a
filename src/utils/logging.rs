//! Logging setup for the solver binaries.

use env_logger::Env;

/// Initialise env_logger at `info` unless `RUST_LOG` says otherwise.
/// Safe to call more than once; later calls are no-ops.
pub fn setup_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();
}
