//! Terminal artifacts of a pipeline run and the attempt audit trail

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use codeforge_router::Outcome;
use codeforge_utils::error::{ErrorCategory, UserFriendlyError};
use codeforge_utils::redaction::redact_error_message;
use codeforge_utils::{ExitCode, Language};
use codeforge_validation::ValidationReport;

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    TransientError,
    FatalError,
}

impl From<Outcome> for AttemptOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Success,
            Outcome::TransientError { .. } => Self::TransientError,
            Outcome::FatalError => Self::FatalError,
        }
    }
}

/// One model call made for a chunk. Appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub chunk_index: usize,
    /// 0 for the initial generation, then one per fix iteration
    pub iteration: u32,
    pub model_used: String,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", with = "duration_millis")]
    pub duration: Duration,
    pub outcome: AttemptOutcome,
    /// Redacted provider error, absent on success
    pub error_detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAttemptStats {
    pub attempts: u32,
    pub successes: u32,
    pub transient_errors: u32,
    pub fatal_errors: u32,
    #[serde(rename = "total_duration_ms", with = "duration_millis")]
    pub total_duration: Duration,
}

/// Attempts aggregated per model, ordered by model name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelUsageSummary {
    models: BTreeMap<String, ModelAttemptStats>,
}

impl ModelUsageSummary {
    #[must_use]
    pub fn from_attempts(attempts: &[AttemptRecord]) -> Self {
        let mut models: BTreeMap<String, ModelAttemptStats> = BTreeMap::new();
        for attempt in attempts {
            let stats = models.entry(attempt.model_used.clone()).or_default();
            stats.attempts += 1;
            stats.total_duration += attempt.duration;
            match attempt.outcome {
                AttemptOutcome::Success => stats.successes += 1,
                AttemptOutcome::TransientError => stats.transient_errors += 1,
                AttemptOutcome::FatalError => stats.fatal_errors += 1,
            }
        }
        Self { models }
    }

    #[must_use]
    pub fn get(&self, model: &str) -> Option<&ModelAttemptStats> {
        self.models.get(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelAttemptStats)> {
        self.models.iter().map(|(name, stats)| (name.as_str(), stats))
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.models.values().map(|s| s.attempts).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Successful end of a run. Built only once the pipeline has succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub request_id: String,
    pub code: String,
    pub language: Language,
    /// Fix iterations spent; 0 when the first generation validated
    pub iterations_used: u32,
    pub model_usage_summary: ModelUsageSummary,
    pub final_validation: ValidationReport,
    /// External modules the code imports
    pub dependencies: Vec<String>,
    pub attempts: Vec<AttemptRecord>,
}

/// Why a run ended in `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// An atomic unit cannot be split to fit the smallest model
    TokenBudgetExceeded,
    /// Every model was excluded or unhealthy for a chunk
    ModelUnavailable,
    /// Per-chunk attempts ran out on transient errors
    TransientProviderError,
    /// The provider rejected the call in a way retrying cannot fix
    FatalProviderError,
    /// Fix iterations ran out with errors remaining
    ValidationFailed,
    /// A fix iteration reproduced the previous code byte for byte
    NonConvergence,
    /// Request deadline or validation timeout
    Timeout,
    Cancelled,
}

impl FailureCause {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TokenBudgetExceeded => "token_budget_exceeded",
            Self::ModelUnavailable => "model_unavailable",
            Self::TransientProviderError => "transient_provider_error",
            Self::FatalProviderError => "fatal_provider_error",
            Self::ValidationFailed => "validation_failed",
            Self::NonConvergence => "non_convergence",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::TokenBudgetExceeded => ExitCode::TOKEN_BUDGET,
            Self::ModelUnavailable | Self::TransientProviderError | Self::FatalProviderError => {
                ExitCode::MODEL_FAILURE
            }
            Self::ValidationFailed | Self::NonConvergence => ExitCode::VALIDATION_FAILED,
            Self::Timeout => ExitCode::TIMEOUT,
            Self::Cancelled => ExitCode::CANCELLED,
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::TokenBudgetExceeded => "Token budget exceeded",
            Self::ModelUnavailable => "No model available",
            Self::TransientProviderError => "Provider attempts exhausted",
            Self::FatalProviderError => "Provider error",
            Self::ValidationFailed => "Validation failed",
            Self::NonConvergence => "Fix loop did not converge",
            Self::Timeout => "Timed out",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(text)
    }
}

/// Failed end of a run, carrying the best partial artifact available.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{cause}: {message}")]
pub struct GenerationFailure {
    pub request_id: String,
    pub cause: FailureCause,
    pub message: String,
    /// Last fully assembled code, if any generation completed
    pub partial_code: Option<String>,
    pub last_validation: Option<ValidationReport>,
    pub iterations_used: u32,
    pub model_usage_summary: ModelUsageSummary,
    pub attempts: Vec<AttemptRecord>,
}

impl GenerationFailure {
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        self.cause.exit_code()
    }

    /// Message, context and suggestions for the terminal, redacted
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());
        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }
        redact_error_message(&output)
    }
}

impl UserFriendlyError for GenerationFailure {
    fn user_message(&self) -> String {
        format!("{} ({}): {}", self.cause, self.request_id, self.message)
    }

    fn context(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.iterations_used > 0 {
            parts.push(format!("{} fix iteration(s) were used.", self.iterations_used));
        }
        if let Some(error) = self.last_validation.as_ref().and_then(|r| r.primary_error()) {
            parts.push(format!("Last validation error: {error}."));
        }
        if self.partial_code.is_some() {
            parts.push("A partial result is available.".to_string());
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    fn suggestions(&self) -> Vec<String> {
        let text = match self.cause {
            FailureCause::TokenBudgetExceeded => {
                "Split the request, lower chunking.context_tokens or allow forced splits"
            }
            FailureCause::ModelUnavailable | FailureCause::TransientProviderError => {
                "Retry later or configure additional [[models]] for failover"
            }
            FailureCause::FatalProviderError => {
                "Check the API key variable, endpoint and model name in [[models]]"
            }
            FailureCause::ValidationFailed | FailureCause::NonConvergence => {
                "Refine the prompt or raise pipeline.max_iterations"
            }
            FailureCause::Timeout => {
                "Raise pipeline.request_deadline_secs or use --request-deadline"
            }
            FailureCause::Cancelled => return Vec::new(),
        };
        vec![text.to_string()]
    }

    fn category(&self) -> ErrorCategory {
        match self.cause {
            FailureCause::TokenBudgetExceeded => ErrorCategory::TokenBudget,
            FailureCause::ModelUnavailable => ErrorCategory::ModelRouting,
            FailureCause::TransientProviderError | FailureCause::FatalProviderError => {
                ErrorCategory::Provider
            }
            FailureCause::ValidationFailed | FailureCause::NonConvergence => {
                ErrorCategory::Validation
            }
            FailureCause::Timeout | FailureCause::Cancelled => ErrorCategory::Execution,
        }
    }
}
