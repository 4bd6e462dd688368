//! Deterministic validator for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use codeforge_utils::Language;

use crate::Validator;
use crate::report::ValidationReport;

type Judge = Box<dyn Fn(&str) -> ValidationReport + Send + Sync>;

/// Answers from a queue of reports, then from a fallback judge.
///
/// Without a judge, code is accepted once the queue is empty. Every
/// validated artifact is recorded.
#[derive(Default)]
pub struct ScriptedValidator {
    queue: Mutex<VecDeque<ValidationReport>>,
    judge: Option<Judge>,
    seen: Mutex<Vec<String>>,
}

impl std::fmt::Debug for ScriptedValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedValidator")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl ScriptedValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `report` for every call
    #[must_use]
    pub fn always(report: ValidationReport) -> Self {
        Self::new().with_judge(move |_| report.clone())
    }

    #[must_use]
    pub fn with_judge(mut self, judge: impl Fn(&str) -> ValidationReport + Send + Sync + 'static) -> Self {
        self.judge = Some(Box::new(judge));
        self
    }

    pub fn push(&self, report: ValidationReport) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(report);
    }

    /// Code passed to each call, in order
    #[must_use]
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    async fn validate(&self, code: &str, _language: &Language) -> ValidationReport {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(code.to_string());

        let queued = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match (queued, &self.judge) {
            (Some(report), _) => report,
            (None, Some(judge)) => judge(code),
            (None, None) => ValidationReport::passed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Diagnostic;

    #[tokio::test]
    async fn test_queue_then_judge() {
        let validator = ScriptedValidator::new()
            .with_judge(|code| {
                if code.contains("bug") {
                    ValidationReport::failed(Diagnostic::syntax("bug found"))
                } else {
                    ValidationReport::passed()
                }
            });
        validator.push(ValidationReport::failed(Diagnostic::syntax("first")));

        assert!(!validator.validate("ok", &Language::Python).await.is_valid);
        assert!(validator.validate("ok", &Language::Python).await.is_valid);
        assert!(!validator.validate("bug", &Language::Python).await.is_valid);
        assert_eq!(validator.seen(), vec!["ok", "ok", "bug"]);
    }
}
