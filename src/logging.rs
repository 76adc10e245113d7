//! Logging initialization.
//!
//! Uses the `tracing` ecosystem; output goes to stderr in either a
//! human-readable or JSON format. `RUST_LOG` overrides the default level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. Call once, before the first request.
///
/// # Arguments
///
/// * `verbose` - Log at DEBUG instead of INFO (canvas choice, ignored form fields, limiter pruning).
/// * `json_format` - Emit one JSON object per event instead of the pretty layout.
///
/// # Notes
///
/// - Everything is written to stderr
/// - `RUST_LOG` wins over `verbose` when set, e.g. `RUST_LOG=caption_studio=trace,tower_http=info`
pub fn init(verbose: bool, json_format: bool) {
    // RUST_LOG first, then the flag
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_format {
        // For log shippers
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // Terminal output
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}
