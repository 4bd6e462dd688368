use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use codeforge_utils::LlmError;

/// The router's live record of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    /// Lower ranks are preferred
    pub priority_rank: u32,
    pub max_tokens: usize,
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    /// End of the current unhealthy window
    pub rate_limited_until: Option<Instant>,
}

impl ModelDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, priority_rank: u32, max_tokens: usize) -> Self {
        Self {
            name: name.into(),
            priority_rank,
            max_tokens,
            is_healthy: true,
            consecutive_failures: 0,
            rate_limited_until: None,
        }
    }

    /// Whether the model may be selected at `now`
    #[must_use]
    pub fn is_eligible_at(&self, now: Instant) -> bool {
        self.is_healthy || self.rate_limited_until.is_some_and(|until| until <= now)
    }
}

/// Result of one model call, as reported back to the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Timeout, 5xx, rate limit or connectivity failure
    TransientError {
        /// Provider hint; overrides the backoff schedule when present
        retry_after: Option<Duration>,
    },
    /// Retrying cannot help; health is left untouched
    FatalError,
}

impl Outcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::TransientError { .. } => "transient_error",
            Self::FatalError => "fatal_error",
        }
    }
}

impl From<&LlmError> for Outcome {
    fn from(err: &LlmError) -> Self {
        if err.is_transient() {
            Self::TransientError {
                retry_after: err.retry_after(),
            }
        } else {
            Self::FatalError
        }
    }
}

/// Per-model call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelUsage {
    pub calls: u64,
    pub successes: u64,
    pub transient_failures: u64,
    pub fatal_failures: u64,
}

impl ModelUsage {
    pub(crate) fn record(&mut self, outcome: Outcome) {
        self.calls += 1;
        match outcome {
            Outcome::Success => self.successes += 1,
            Outcome::TransientError { .. } => self.transient_failures += 1,
            Outcome::FatalError => self.fatal_failures += 1,
        }
    }
}

/// Point-in-time view of one model for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub name: String,
    pub priority_rank: u32,
    pub max_tokens: usize,
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    /// Seconds until the model is eligible again, rounded up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_for_secs: Option<u64>,
    pub usage: ModelUsage,
}
