//! Logging initialization
//!
//! stdout carries the JSON-RPC stream, so all diagnostics go to stderr.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// The level is driven by `RUST_LOG`, defaulting to `info`. Safe to call once
/// from the binary entry point; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
