//! codeforge - chunked, failover-aware LLM code generation
//!
//! codeforge turns a natural-language request into validated code. Requests
//! that exceed a model's context are split into chunks that fit every
//! configured model, each chunk is routed to the healthiest model by
//! priority, and the assembled code goes through a bounded validate-and-fix
//! loop.
//!
//! codeforge can be used in two ways:
//! - **CLI**: run `codeforge generate`, `plan`, `validate`, `models` or `config`
//! - **Library**: embed [`GenerationOrchestrator`] in your own service
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Generate code from a prompt
//! codeforge generate "A CLI that counts words in a file" --language python
//!
//! # Preview the chunk plan for a large request without calling a model
//! codeforge plan request.md --language python
//!
//! # Validate an existing file
//! codeforge validate script.py --language python --json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use codeforge::{
//!     CancellationToken, CliArgs, Config, GenerationOrchestrator, GenerationRequest,
//!     Language, ProgressEmitter,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(Config::discover(&CliArgs::default())?);
//! let orchestrator = GenerationOrchestrator::from_config(config)?;
//!
//! let request = GenerationRequest::new("A debounce helper", Language::TypeScript)?;
//! let (progress, mut events) = ProgressEmitter::channel(64);
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         eprintln!("[{}] {}", event.stage, event.message);
//!     }
//! });
//!
//! match orchestrator.run(request, CancellationToken::new(), progress).await {
//!     Ok(result) => println!("{}", result.code),
//!     Err(failure) => eprintln!("{}", failure.display_for_user()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! The re-exports below are covered by semver for 1.x releases. Member crates
//! are reachable through module paths but are marked `#[doc(hidden)]`.

// ============================================================================
// Stable Public API - covered by semver guarantees for 1.x
// ============================================================================

/// Configuration for codeforge operations.
///
/// Precedence is CLI arguments > config file > built-in defaults. Use
/// [`Config::discover()`] for CLI-like behaviour or [`Config::builder()`] for
/// deterministic programmatic construction.
pub use codeforge_config::Config;

/// Builder for programmatic configuration.
///
/// # Example
///
/// ```rust,no_run
/// use codeforge::Config;
/// use std::time::Duration;
///
/// let config = Config::builder()
///     .safety_buffer(300)
///     .max_iterations(3)
///     .request_deadline(Duration::from_secs(300))
///     .build()
///     .expect("Failed to build config");
/// ```
pub use codeforge_config::ConfigBuilder;

/// CLI overrides applied by [`Config::discover()`]
pub use codeforge_config::CliArgs;

/// Library-level error type with user-facing rendering and exit code mapping
pub use codeforge_utils::error::CodeforgeError;

/// Exit codes matching the documented exit code table
pub use codeforge_utils::exit_codes::ExitCode;

pub use codeforge_utils::error::{
    BudgetError, ErrorCategory, LlmError, PlanError, RouterError, UserFriendlyError,
};
pub use codeforge_utils::types::Language;

pub use codeforge_orchestrator::{
    AttemptOutcome, AttemptRecord, CancellationToken, FailureCause, GenerationFailure,
    GenerationOrchestrator, GenerationRequest, GenerationResult, ModelAttemptStats,
    ModelUsageSummary, ProgressEmitter, ProgressEvent, RequestError, Stage, Template,
    extract_code, find_template,
};

pub use codeforge_budget::{TokenBudget, TokenBudgetEstimator};
pub use codeforge_chunker::{Chunk, ChunkPlan, ChunkPlanner, ContentKind, OutputAssembler};
pub use codeforge_llm::{ModelBackend, ModelCompletion, ModelInvocation};
pub use codeforge_router::{ModelDescriptor, ModelRouter, ModelStatus, Outcome};
pub use codeforge_validation::{
    CompositeValidator, Diagnostic, IssueKind, ValidationReport, Validator,
};

// ============================================================================
// Internal modules - accessible but not stable
// ============================================================================

#[doc(hidden)]
pub use codeforge_utils::{logging, redaction};

#[doc(hidden)]
pub use codeforge_budget as budget;
#[doc(hidden)]
pub use codeforge_chunker as chunker;
#[doc(hidden)]
pub use codeforge_config as config;
#[doc(hidden)]
pub use codeforge_llm as llm;
#[doc(hidden)]
pub use codeforge_orchestrator as orchestrator;
#[doc(hidden)]
pub use codeforge_router as router;
#[doc(hidden)]
pub use codeforge_validation as validation;

// CLI module - exported with #[doc(hidden)] for white-box testing of flag parsing
#[doc(hidden)]
pub mod cli;
