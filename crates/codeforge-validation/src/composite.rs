use async_trait::async_trait;
use tracing::debug;

use codeforge_config::Config;
use codeforge_utils::Language;

use crate::Validator;
use crate::execution::ExecutionValidator;
use crate::report::ValidationReport;
use crate::syntax::SyntaxValidator;

/// Syntax checks first, then execution for code that parses.
#[derive(Debug, Clone, Default)]
pub struct CompositeValidator {
    syntax: SyntaxValidator,
    execution: Option<ExecutionValidator>,
}

impl CompositeValidator {
    #[must_use]
    pub fn new(execution: Option<ExecutionValidator>) -> Self {
        Self {
            syntax: SyntaxValidator::new(),
            execution,
        }
    }

    /// Execution is enabled by `validation.execute`
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let execution = config.validation.execute.then(|| {
            ExecutionValidator::from_config(&config.validation, config.pipeline.validation_timeout())
        });
        Self::new(execution)
    }

    #[must_use]
    pub const fn executes(&self) -> bool {
        self.execution.is_some()
    }
}

#[async_trait]
impl Validator for CompositeValidator {
    async fn validate(&self, code: &str, language: &Language) -> ValidationReport {
        let report = self.syntax.check(code, language);
        let Some(execution) = &self.execution else {
            return report;
        };
        if !report.is_valid {
            debug!(language = %language, "Skipping execution of syntactically invalid code");
            return report;
        }
        report.merge(execution.validate(code, language).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[tokio::test]
    async fn test_syntax_only_by_default() {
        let validator = CompositeValidator::from_config(&Config::minimal_for_testing());
        assert!(!validator.executes());
        let report = validator.validate("def f(:\n", &Language::Python).await;
        assert!(!report.is_valid);
    }

    #[tokio::test]
    async fn test_invalid_syntax_is_not_executed() {
        let mut runners = BTreeMap::new();
        runners.insert("python".to_string(), vec!["codeforge-no-such-interpreter".to_string()]);
        let validator = CompositeValidator::new(Some(ExecutionValidator::new(
            runners,
            Duration::from_secs(1),
        )));

        let report = validator.validate("x = (\n", &Language::Python).await;
        assert!(!report.is_valid);
        assert!(report.warnings.is_empty());

        let report = validator.validate("x = 1\n", &Language::Python).await;
        assert!(report.is_valid);
        assert!(report.warnings[0].starts_with("Execution skipped"));
    }
}
