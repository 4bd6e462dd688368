//! Validation of generated code
//!
//! A [`Validator`] turns candidate code plus a language into a fresh
//! [`ValidationReport`]. Only error diagnostics make a report invalid;
//! warnings and suggestions are advisory.

mod analyzer;
mod composite;
mod delimiters;
mod dependencies;
mod execution;
mod grammar;
mod report;
mod syntax;

#[cfg(any(test, feature = "test-utils"))]
mod scripted;

use async_trait::async_trait;

use codeforge_utils::Language;

pub use analyzer::ErrorAnalyzer;
pub use composite::CompositeValidator;
pub use dependencies::extract_dependencies;
pub use execution::ExecutionValidator;
pub use report::{Diagnostic, IssueKind, Severity, ValidationReport};
pub use syntax::SyntaxValidator;

#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedValidator;

/// Checks candidate code for one language.
///
/// Implementations must be deterministic for identical input so that
/// re-validating accepted code cannot start a fix loop.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, code: &str, language: &Language) -> ValidationReport;
}
