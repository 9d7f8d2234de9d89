//! Logging setup for binaries and services embedding the engine.
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! the host installs a subscriber, either its own or the one below.
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "catchment_core=info";

/// Install a stderr fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
}
