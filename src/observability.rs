//! Observability utilities.

use crate::types::ObservabilityConfig;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize tracing subscriber once for the process.
///
/// Log format defaults to plain text and can be switched to JSON via
/// `VERTICORE_LOG_FORMAT=json`. Filter defaults to `info` if `RUST_LOG` is unset.
pub fn init_tracing() {
    init_tracing_with(&ObservabilityConfig::default());
}

/// Initialize tracing from configuration. `RUST_LOG` and
/// `VERTICORE_LOG_FORMAT` still take precedence.
pub fn init_tracing_with(config: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
        let json = std::env::var("VERTICORE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(config.json_logs);

        let result = if json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact())
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}

/// Span wrapping the handling of one inbound request.
pub fn request_span(correlation_id: &str, address: &str) -> tracing::Span {
    tracing::info_span!("request", correlation_id = %correlation_id, address = %address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[tracing_test::traced_test]
    #[test]
    fn request_span_carries_correlation_id() {
        let span = request_span("brave-otter-001", "verticore.debug.ping");
        let _entered = span.enter();
        tracing::info!("inside");
        assert!(logs_contain("brave-otter-001"));
    }
}
