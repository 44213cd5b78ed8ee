// src/logging.rs
//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "QTRACE_LOG";

/// Default directives when `QTRACE_LOG` is unset or invalid. The directive
/// target is a prefix, so it also covers `qtrace_core::*`.
pub const DEFAULT_FILTER: &str = "qtrace=warn";

/// Installs the global subscriber, writing to stderr so report output on
/// stdout stays machine-readable.
///
/// Format: `QTRACE_LOG=qtrace_core::scanner=debug,qtrace_core::analysis=info`
///
/// Idempotent: later calls are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // A subscriber installed elsewhere (e.g. by an embedding host) wins.
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::warn!("still alive after double init");
    }
}
