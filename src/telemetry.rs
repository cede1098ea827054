//! Tracing setup for binaries and integration tests.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber driven by `RUST_LOG`.
///
/// Defaults to `info` for this crate when `RUST_LOG` is unset. Safe to call
/// more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deckweave=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
