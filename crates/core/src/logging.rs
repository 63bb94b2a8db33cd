//! Diagnostic logging
//!
//! Run output meant for the user (headers, errors, the summary) is printed
//! directly. Diagnostics go through `tracing` to stderr so they never interleave
//! with that output when it is piped.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flag.
///
/// Calling this more than once keeps the first subscriber.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .try_init();
}
