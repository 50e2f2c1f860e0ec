//! Tracing setup for the binaries.

use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global `tracing` subscriber: a fmt layer on stderr,
/// filtered by `RUST_LOG` (default `info`).
///
/// Calling it twice is harmless; the second call keeps the subscriber
/// already installed.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(error) = installed {
        tracing::debug!(%error, "tracing subscriber already installed, keeping it");
    }
}
