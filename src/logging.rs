//! Logging setup
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for JSON
//! results.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directive for a `-v` count.
pub fn directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// `-v` flags take precedence over `RUST_LOG`. Installing twice is a no-op.
pub fn init(verbosity: u8) {
    let filter = if verbosity > 0 {
        EnvFilter::new(directive(verbosity))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(0)))
    };

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}
