//! Validate command implementation
//!
//! Handles `codeforge validate`: run the configured validators on a file.

use anyhow::Result;
use std::path::Path;

use super::common::{AlreadyReported, parse_language, print_json, read_input};
use crate::{CompositeValidator, Config, ExitCode, ValidationReport, Validator};

/// Execute the validate command
pub async fn execute_validate_command(
    config: &Config,
    file: &Path,
    language: &str,
    json: bool,
) -> Result<()> {
    let code = read_input(Some(file))?;
    let language = parse_language(language);
    let validator = CompositeValidator::from_config(config);
    let timeout = config.pipeline.validation_timeout();

    let Ok(report) = tokio::time::timeout(timeout, validator.validate(&code, &language)).await
    else {
        eprintln!(
            "Error: validation of {} did not finish within {}s",
            file.display(),
            timeout.as_secs()
        );
        return Err(AlreadyReported(ExitCode::TIMEOUT).into());
    };

    if json {
        print_json(&report)?;
    } else {
        print!("{}", render_report(&file.display().to_string(), &report));
    }

    if report.is_valid {
        Ok(())
    } else {
        Err(AlreadyReported(ExitCode::VALIDATION_FAILED).into())
    }
}

fn render_report(name: &str, report: &ValidationReport) -> String {
    let mut out = if report.is_valid {
        format!("✓ {name}: valid\n")
    } else {
        format!("✗ {name}: {} error(s)\n", report.errors.len())
    };
    for error in &report.errors {
        match error.line {
            Some(line) => out.push_str(&format!("  error (line {line}): {error}\n")),
            None => out.push_str(&format!("  error: {error}\n")),
        }
    }
    for warning in &report.warnings {
        out.push_str(&format!("  warning: {warning}\n"));
    }
    for suggestion in &report.suggestions {
        out.push_str(&format!("  suggestion: {suggestion}\n"));
    }
    out
}
