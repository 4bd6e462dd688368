//! Generation pipeline for codeforge
//!
//! [`GenerationOrchestrator`] takes one [`GenerationRequest`] through an
//! explicit state machine:
//!
//! ```text
//! Planning -> Generating -> Validating -> Succeeded
//!                 ^             |
//!                 +-- Fixing <--+          (any live stage) -> Failed
//! ```
//!
//! - **Planning** splits the prompt and context into chunks sized for the
//!   smallest configured model.
//! - **Generating** sends chunks in order through the model router, failing
//!   over to the next eligible model on transient errors.
//! - **Validating** runs the validator once on the assembled code. Warnings
//!   never trigger a fix.
//! - **Fixing** turns the failing code and its diagnostics into a new
//!   planning input and regenerates the whole artifact.
//!
//! A run ends in exactly one of [`GenerationResult`] or
//! [`GenerationFailure`]. The request deadline and the caller's
//! cancellation token abort in-flight calls. Progress is streamed through a
//! [`ProgressEmitter`] on a best-effort basis.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use codeforge_config::Config;
//! use codeforge_orchestrator::{GenerationOrchestrator, GenerationRequest, ProgressEmitter};
//! use codeforge_utils::Language;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = GenerationOrchestrator::from_config(Arc::new(Config::default()))?;
//! let request = GenerationRequest::new("A CLI that counts words", Language::Python)?;
//! let (progress, _events) = ProgressEmitter::channel(64);
//!
//! let result = orchestrator.run(request, CancellationToken::new(), progress).await?;
//! println!("{}", result.code);
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod extract;
mod outcome;
mod pipeline;
mod progress;
pub mod prompts;
mod request;
pub mod templates;

pub use extract::extract_code;
pub use outcome::{
    AttemptOutcome, AttemptRecord, FailureCause, GenerationFailure, GenerationResult,
    ModelAttemptStats, ModelUsageSummary,
};
pub use pipeline::GenerationOrchestrator;
pub use progress::{ProgressEmitter, ProgressEvent, Stage};
pub use request::{GenerationRequest, RequestError};
pub use templates::{Template, find_template, templates_for};

pub use tokio_util::sync::CancellationToken;
