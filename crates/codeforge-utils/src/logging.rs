//! Logging and observability infrastructure for codeforge
//!
//! Structured logging through `tracing`. The CLI installs a subscriber once at
//! startup; library crates only emit events and spans.

use tracing::{Level, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::redaction::redact_error_message;

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("codeforge=debug,info")
            } else {
                EnvFilter::try_new("codeforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing subscriber for structured logging
///
/// Sets up tracing with either compact (default) or verbose format. Logs go to
/// stderr so generated code on stdout stays clean.
///
/// # Arguments
/// * `verbose` - If true, include targets and span-close timings
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = env_filter(verbose);

    if verbose {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Initialize tracing with newline-delimited JSON output on stderr
pub fn init_tracing_json(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true),
        )
        .try_init()?;
    Ok(())
}

/// Create the span that wraps one pipeline run
pub fn request_span(request_id: &str, language: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "generation_request",
        request_id = %request_id,
        language = %language,
    )
}

/// Log a pipeline state transition
pub fn log_transition(request_id: &str, from: &str, to: &str) {
    info!(
        request_id = %request_id,
        from = %from,
        to = %to,
        "Pipeline state transition"
    );
}

/// Log a provider error after redaction
pub fn log_provider_error(model: &str, kind: &str, error: &str) {
    warn!(
        model = %model,
        kind = %kind,
        error = %redact_error_message(error),
        "Model invocation failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_span_has_metadata() {
        let span = request_span("req-1", "python");
        // Without an installed subscriber the span is disabled, but creating it
        // must never panic.
        let _guard = span.enter();
    }

    #[test]
    fn test_double_init_is_an_error_not_a_panic() {
        let _ = init_tracing(false);
        assert!(init_tracing(true).is_err());
    }
}
