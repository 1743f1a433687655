//! Logging setup for binaries and tools.

use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` overrides the default filter (`info`, with `debug` for the
/// emodkit crates). Returns `false` when a global subscriber was already
/// installed; the existing one is kept and the refusal is logged at debug.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,emodkit_harness=debug,emodkit_kernel=debug"));

    match fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => true,
        Err(err) => {
            debug!(%err, "tracing subscriber already installed");
            false
        }
    }
}
