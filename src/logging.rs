//! Tracing setup for the command line tool.
//!
//! The library only emits events; installing a subscriber is left to the
//! binary (or to embedders that already have one).

use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Filter used for a given number of `-v` flags.
///
/// Without flags `RUST_LOG` wins, falling back to `warn`.
pub fn filter_for(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_tracing(verbosity: u8) {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true);

        // Another subscriber may already be installed by an embedder.
        let installed = tracing_subscriber::registry()
            .with(filter_for(verbosity))
            .with(fmt_layer)
            .try_init()
            .is_ok();

        if installed {
            debug!(verbosity, "tracing initialized");
        }
    });
}
