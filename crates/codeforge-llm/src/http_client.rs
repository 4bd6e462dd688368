//! Shared HTTP client for HTTP-based model providers
//!
//! One `reqwest::Client` is built per process and reused for every call. The
//! client makes a single attempt per request; status codes are mapped onto
//! [`LlmError`] so the router can tell transient from fatal failures.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use codeforge_utils::LlmError;
use codeforge_utils::redaction::redact_error_message;

/// Upper bound on any single HTTP call
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider error bodies are truncated to this many chars in error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub(crate) fn new() -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    pub(crate) fn with_max_timeout(max_timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .use_rustls_tls()
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
        })
    }

    /// Start a POST request on the shared client
    pub(crate) fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url)
    }

    /// Execute `request_builder` once with `min(request_timeout, max_timeout)`.
    ///
    /// # Errors
    ///
    /// - `ProviderAuth` for 401/403
    /// - `ProviderQuota` for 429, carrying any `Retry-After` hint
    /// - `BadRequest` for other 4xx
    /// - `ProviderOutage` for 5xx
    /// - `Timeout` when the deadline passes
    /// - `Transport` for connectivity failures
    pub(crate) async fn execute(
        &self,
        request_builder: reqwest::RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, LlmError> {
        let effective_timeout = request_timeout.min(self.max_timeout);

        let request = request_builder
            .timeout(effective_timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("Failed to build request: {e}")))?;

        debug!(
            provider = provider_name,
            timeout_secs = effective_timeout.as_secs(),
            "Executing HTTP request"
        );

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let retry_after = parse_retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                let error = map_status(status, retry_after, &body, provider_name);
                warn!(
                    provider = provider_name,
                    status = status.as_u16(),
                    kind = error.kind_label(),
                    "Provider returned error status"
                );
                Err(error)
            }
            Err(e) if e.is_timeout() => Err(LlmError::Timeout {
                duration: effective_timeout,
            }),
            Err(e) => Err(LlmError::Transport(format!(
                "{provider_name} request failed: {}",
                redact_error_message(&e.to_string())
            ))),
        }
    }
}

fn summarize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let summary: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!(": {}", redact_error_message(&summary))
}

/// Map a non-success status onto the error taxonomy
pub(crate) fn map_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    provider_name: &str,
) -> LlmError {
    let detail = summarize_body(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::ProviderAuth(format!(
            "{provider_name} authentication failed: {status}{detail}"
        )),
        StatusCode::TOO_MANY_REQUESTS => LlmError::ProviderQuota {
            message: format!("{provider_name} rate limit exceeded: {status}{detail}"),
            retry_after,
        },
        s if s.is_server_error() => LlmError::ProviderOutage(format!(
            "{provider_name} returned server error: {status}{detail}"
        )),
        StatusCode::REQUEST_TIMEOUT => LlmError::Transport(format!(
            "{provider_name} timed out the request: {status}{detail}"
        )),
        _ => LlmError::BadRequest(format!(
            "{provider_name} rejected the request: {status}{detail}"
        )),
    }
}

/// Parse `Retry-After` as delta-seconds or an HTTP date
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.signed_duration_since(chrono::Utc::now());
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
