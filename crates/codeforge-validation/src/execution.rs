//! Validation by running code under a configured interpreter

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use codeforge_config::ValidationConfig;
use codeforge_utils::Language;

use crate::Validator;
use crate::analyzer::ErrorAnalyzer;
use crate::report::{Diagnostic, IssueKind, ValidationReport};

/// Bytes of stderr kept for analysis
const MAX_STDERR_BYTES: usize = 4096;

/// Runs code with the interpreter configured for its language.
///
/// The code is written to a temporary file which is passed as the last
/// argument. The child is killed when the call times out or its future is
/// dropped, so cancellation never leaves a runner behind.
#[derive(Debug, Clone)]
pub struct ExecutionValidator {
    runners: BTreeMap<String, Vec<String>>,
    timeout: Duration,
}

impl ExecutionValidator {
    #[must_use]
    pub fn new(runners: BTreeMap<String, Vec<String>>, timeout: Duration) -> Self {
        Self { runners, timeout }
    }

    #[must_use]
    pub fn from_config(validation: &ValidationConfig, timeout: Duration) -> Self {
        Self::new(validation.runners.clone(), timeout)
    }

    fn runner_for(&self, language: &Language) -> Option<&[String]> {
        self.runners
            .get(language.as_str())
            .map(Vec::as_slice)
            .filter(|cmd| !cmd.is_empty())
    }

    async fn run(&self, runner: &[String], code: &str, language: &Language) -> ValidationReport {
        let file = match write_source(code, language) {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "Could not stage code for execution");
                return ValidationReport::passed()
                    .with_warning(format!("Execution skipped: could not write temp file: {e}"));
            }
        };

        let (program, args) = match runner.split_first() {
            Some(split) => split,
            None => return ValidationReport::passed(),
        };

        let child = Command::new(program)
            .args(args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(runner = %program, error = %e, "Runner could not be started");
                return ValidationReport::passed()
                    .with_warning(format!("Execution skipped: failed to start '{program}': {e}"));
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ValidationReport::passed()
                    .with_warning(format!("Execution skipped: failed to wait for '{program}': {e}"));
            }
            Err(_) => {
                let diag = Diagnostic::new(
                    IssueKind::Resource,
                    format!("Execution timed out after {}s", self.timeout.as_secs()),
                );
                return ValidationReport::failed(diag);
            }
        };

        debug!(
            runner = %program,
            status = %output.status,
            "Execution finished"
        );

        if output.status.success() {
            return ValidationReport::passed();
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = truncate_tail(&stderr, MAX_STDERR_BYTES);
        let stderr = stderr.replace(&file.path().display().to_string(), "<generated>");
        let diagnostic = ErrorAnalyzer::diagnose(&stderr);
        let suggestions = ErrorAnalyzer::suggestions(&diagnostic);
        ValidationReport::new(vec![diagnostic], Vec::new(), suggestions)
    }
}

fn extension_for(language: &Language) -> &'static str {
    match language {
        Language::Python => "py",
        Language::JavaScript => "js",
        Language::TypeScript => "ts",
        Language::Html => "html",
        Language::Css => "css",
        Language::Rust => "rs",
        Language::Other(_) => "txt",
    }
}

fn write_source(code: &str, language: &Language) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("codeforge-")
        .suffix(&format!(".{}", extension_for(language)))
        .tempfile()?;
    file.write_all(code.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Keep the end of `text`, where interpreters print the actual error
fn truncate_tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[async_trait]
impl Validator for ExecutionValidator {
    async fn validate(&self, code: &str, language: &Language) -> ValidationReport {
        match self.runner_for(language) {
            Some(runner) => self.run(runner, code, language).await,
            None => ValidationReport::passed()
                .with_warning(format!("No runner configured for language: {language}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(language: &str, runner: &[&str], timeout: Duration) -> ExecutionValidator {
        let mut runners = BTreeMap::new();
        runners.insert(
            language.to_string(),
            runner.iter().map(|s| (*s).to_string()).collect(),
        );
        ExecutionValidator::new(runners, timeout)
    }

    #[tokio::test]
    async fn test_missing_runner_passes_with_warning() {
        let v = ExecutionValidator::new(BTreeMap::new(), Duration::from_secs(1));
        let report = v.validate("print(1)", &Language::Python).await;
        assert!(report.is_valid);
        assert_eq!(report.warnings, vec!["No runner configured for language: python".to_string()]);
    }

    #[tokio::test]
    async fn test_unstartable_runner_is_skipped() {
        let v = validator("python", &["codeforge-no-such-interpreter"], Duration::from_secs(5));
        let report = v.validate("print(1)", &Language::Python).await;
        assert!(report.is_valid);
        assert!(report.warnings[0].starts_with("Execution skipped"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_becomes_error() {
        let v = validator("other", &["sh"], Duration::from_secs(10));
        let code = "echo \"ModuleNotFoundError: No module named 'numpy'\" >&2\nexit 1\n";
        let report = v.validate(code, &Language::Other("other".to_string())).await;
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].kind, IssueKind::Dependency);
        assert_eq!(
            report.suggestions,
            vec!["Install or remove the missing module 'numpy'".to_string()]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_passes() {
        let v = validator("other", &["sh"], Duration::from_secs(10));
        let report = v.validate("exit 0\n", &Language::Other("other".to_string())).await;
        assert_eq!(report, ValidationReport::passed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_resource_error() {
        let v = validator("other", &["sh"], Duration::from_millis(200));
        let report = v.validate("sleep 5\n", &Language::Other("other".to_string())).await;
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].kind, IssueKind::Resource);
    }

    #[test]
    fn test_truncate_tail_respects_char_boundaries() {
        let text = "ééé error";
        let tail = truncate_tail(text, 7);
        assert!(tail.ends_with("error"));
        assert!(tail.len() <= 7);
    }
}
