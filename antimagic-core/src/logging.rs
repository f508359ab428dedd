//! Structured logging using **tracing**.
//!
//! Library code only emits events through the `tracing` macros; binaries pick
//! the subscriber. Everything goes to stderr so stdout stays reserved for
//! reports.

use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "antimagic_core=info,antimagic=info";

/// Initializes the global tracing subscriber.
///
/// Call once at startup. With `json` set, events are emitted as one JSON
/// object per line (level, target, span context), otherwise as compact text.
///
/// # Environment Variables
/// - `RUST_LOG`: Controls log filtering (e.g., `RUST_LOG=antimagic_core=debug`)
pub fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // A second initialisation (tests, embedding) is not an error worth surfacing.
    let _ = if json {
        builder
            .json()
            .with_ansi(false)
            .with_current_span(true)
            .try_init()
    } else {
        builder.compact().try_init()
    };
}
