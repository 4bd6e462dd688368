use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::exit_codes::ExitCode;
use crate::redaction::redact_error_message;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `CodeforgeError` is the error returned by configuration, planning and CLI
/// operations. Request-level pipeline failures are reported separately as a
/// `GenerationFailure` by the orchestrator, because they carry a partial
/// artifact in addition to the cause.
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration errors |
/// | 4 | Token budget errors |
/// | 5 | Model routing and provider errors |
/// | 10 | Provider timeouts |
/// | 1 | Other errors |
///
/// # Example
///
/// ```rust
/// use codeforge_utils::error::{CodeforgeError, ConfigError};
/// use codeforge_utils::exit_codes::ExitCode;
///
/// let err = CodeforgeError::Config(ConfigError::MissingRequired("models".to_string()));
/// assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
/// assert!(err.display_for_user().contains("models"));
/// ```
#[derive(Error, Debug)]
pub enum CodeforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Token budget error: {0}")]
    Budget(#[from] BudgetError),

    #[error("Chunk planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Model routing error: {0}")]
    Router(#[from] RouterError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    TokenBudget,
    ModelRouting,
    Provider,
    FileSystem,
    Validation,
    /// Deadlines and cancellation
    Execution,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::TokenBudget => write!(f, "Token Budget"),
            Self::ModelRouting => write!(f, "Model Routing"),
            Self::Provider => write!(f, "Provider"),
            Self::FileSystem => write!(f, "File System"),
            Self::Validation => write!(f, "Validation"),
            Self::Execution => write!(f, "Execution"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => {
                format!("Required configuration '{key}' is missing")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => {
                format!("Configuration file not found: {path}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with optional [budget], [chunking], \
                 [pipeline], [router], [validation] sections and [[models]] entries."
                    .to_string(),
            ),
            Self::MissingRequired(_) => None,
            Self::InvalidValue { key, value: _ } => Some(format!(
                "The '{key}' configuration option has specific format requirements."
            )),
            Self::NotFound { path: _ } => Some(
                "codeforge searches for codeforge.toml or .codeforge/config.toml from the \
                 current directory upward."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Run 'codeforge config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![format!("Add '{key}' to your configuration file")],
            Self::InvalidValue { key, value: _ } => match key.as_str() {
                "models" => vec![
                    "Declare at least one [[models]] entry with name, max_tokens and priority"
                        .to_string(),
                ],
                "budget.safety_buffer" => vec![
                    "Use a safety buffer smaller than every model's max_tokens".to_string(),
                ],
                "router.unhealthy_backoff_secs" => {
                    vec!["Provide at least one backoff duration, e.g. [30, 60, 120]".to_string()]
                }
                _ => vec![
                    "Use a positive value for this option".to_string(),
                    "Remove the option to use the default value".to_string(),
                ],
            },
            Self::NotFound { path: _ } => vec![
                "Check the path passed to --config".to_string(),
                "Omit --config to use discovery and built-in defaults".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors produced while deriving a model's token budget
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BudgetError {
    #[error(
        "Model {model} has no usable budget: max_tokens {max_tokens} minus safety buffer {safety_buffer} is not positive"
    )]
    NonPositiveLimit {
        model: String,
        max_tokens: usize,
        safety_buffer: usize,
    },

    #[error("No models configured")]
    NoModels,
}

/// Errors produced by the chunk planner
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// An atomic unit cannot be split to fit the budget
    #[error(
        "Unit {unit_index} needs ~{estimated_tokens} tokens and cannot be split below the limit of {limit}"
    )]
    TokenBudgetExceeded {
        unit_index: usize,
        estimated_tokens: usize,
        limit: usize,
    },

    /// The budget leaves no room for chunk text once the context window is reserved
    #[error("Chunk capacity is zero: effective limit {effective_limit}, context reserve {reserve}")]
    EmptyBudget {
        effective_limit: usize,
        reserve: usize,
    },
}

/// Errors produced by the model router
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Every configured model is excluded or unhealthy
    #[error("No model available ({excluded} excluded, {unhealthy} unhealthy)")]
    NotAvailable { excluded: usize, unhealthy: usize },
}

/// Errors that can occur during LLM backend operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, malformed response body)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {message}")]
    ProviderQuota {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Provider rejected the request as malformed (400, 404, 422)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The completion stopped at the output token limit
    #[error("Completion truncated at {max_output_tokens} output tokens")]
    Truncated { max_output_tokens: usize },
}

impl LlmError {
    /// Whether a retry against another model may succeed.
    ///
    /// Timeouts, 5xx, rate limits and connectivity failures are transient.
    /// Authentication failures, malformed requests and misconfiguration are fatal.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ProviderQuota { .. }
                | Self::ProviderOutage(_)
                | Self::Timeout { .. }
                | Self::Truncated { .. }
        )
    }

    /// Provider-supplied re-eligibility hint, if any
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ProviderQuota { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short machine-readable label for audit records and logs
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::ProviderAuth(_) => "auth",
            Self::ProviderQuota { .. } => "rate_limited",
            Self::ProviderOutage(_) => "outage",
            Self::Timeout { .. } => "timeout",
            Self::BadRequest(_) => "bad_request",
            Self::Misconfiguration(_) => "misconfiguration",
            Self::Unsupported(_) => "unsupported",
            Self::Truncated { .. } => "truncated",
        }
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota { message, .. } => {
                format!("LLM provider quota exceeded: {message}")
            }
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {duration:?}")
            }
            Self::BadRequest(msg) => format!("LLM provider rejected the request: {msg}"),
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("Unsupported LLM feature: {msg}"),
            Self::Truncated { max_output_tokens } => {
                format!("LLM output was cut off at {max_output_tokens} tokens")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ProviderAuth(_) => Some(
                "Each model reads its API key from the environment variable named by api_key_env."
                    .to_string(),
            ),
            Self::ProviderQuota { retry_after, .. } => retry_after
                .map(|d| format!("The provider asked to retry after {}s.", d.as_secs())),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderAuth(_) => vec![
                "Export the API key variable configured for the model (default: GITHUB_TOKEN)"
                    .to_string(),
            ],
            Self::ProviderQuota { .. } | Self::ProviderOutage(_) | Self::Transport(_) => vec![
                "Retry later or configure additional [[models]] for failover".to_string(),
            ],
            Self::Timeout { .. } => {
                vec!["Increase pipeline.per_call_timeout_secs or use --per-call-timeout".to_string()]
            }
            Self::BadRequest(_) | Self::Misconfiguration(_) => {
                vec!["Check the model name, endpoint and max_tokens in [[models]]".to_string()]
            }
            Self::Truncated { .. } => vec![
                "Raise budget.output_reserve so each call leaves more room for the answer"
                    .to_string(),
            ],
            Self::Unsupported(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Misconfiguration(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::Provider,
        }
    }
}

impl UserFriendlyError for CodeforgeError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Llm(err) => err.user_message(),
            Self::Budget(err) => err.to_string(),
            Self::Plan(err) => format!("The request could not be split into chunks: {err}"),
            Self::Router(err) => err.to_string(),
            Self::Io(err) => format!("File system error: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Llm(err) => err.context(),
            Self::Plan(PlanError::TokenBudgetExceeded { .. }) => Some(
                "Chunks are sized against the smallest configured model budget.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Llm(err) => err.suggestions(),
            Self::Budget(_) => vec!["Lower budget.safety_buffer or raise max_tokens".to_string()],
            Self::Plan(_) => vec![
                "Set chunking.allow_forced_splits = true".to_string(),
                "Reduce chunking.context_tokens".to_string(),
            ],
            Self::Router(_) => vec!["Wait for the backoff window or add more models".to_string()],
            Self::Io(_) => vec!["Check the path exists and is readable".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Budget(_) | Self::Plan(_) => ErrorCategory::TokenBudget,
            Self::Router(_) => ErrorCategory::ModelRouting,
            Self::Llm(err) => err.category(),
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl CodeforgeError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// The output is redacted so provider messages never leak credentials.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

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

    /// Map this error to the appropriate CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Budget(_) | Self::Plan(_) => ExitCode::TOKEN_BUDGET,
            Self::Router(_) => ExitCode::MODEL_FAILURE,
            Self::Llm(LlmError::Timeout { .. }) => ExitCode::TIMEOUT,
            Self::Llm(LlmError::Misconfiguration(_)) => ExitCode::CLI_ARGS,
            Self::Llm(_) => ExitCode::MODEL_FAILURE,
            Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}
