//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "PIIREDACT_LOG";

/// Installs the global subscriber, writing to stderr.
///
/// Reads filter directives from `PIIREDACT_LOG`
/// (e.g. `PIIREDACT_LOG=piiredact::redaction=debug`). Falls back to
/// `piiredact=info`, or `piiredact=debug` when `verbose` is set.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose { "piiredact=debug" } else { "piiredact=info" };
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true),
            )
            .with(filter)
            .init();
    });
}
