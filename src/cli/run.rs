//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments and initialises logging
//! - Builds CliArgs and discovers Config
//! - Creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use super::args::{Cli, Commands};
use super::commands::{self, AlreadyReported, GenerateOptions};

use crate::logging::{init_tracing, init_tracing_json};
use crate::redaction::redact_error_message;
use crate::{
    CliArgs, CodeforgeError, Config, ExitCode, GenerationFailure, PlanError, RequestError,
};

/// Main CLI execution function.
///
/// This function handles ALL output including errors. It returns `Result<(), ExitCode>`:
/// - On success: returns `Ok(())` after printing any output
/// - On error: prints a user-facing report on stderr, returns `Err(ExitCode)`
///
/// main.rs only calls `std::process::exit(code.as_i32())` on error - it does NOT print.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let logging = if cli.log_json {
        init_tracing_json(cli.verbose)
    } else {
        init_tracing(cli.verbose)
    };
    if let Err(e) = logging {
        eprintln!("Warning: failed to initialise logging: {e}");
    }

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        safety_buffer: cli.safety_buffer,
        max_iterations: cli.max_iterations,
        per_chunk_max_attempts: cli.max_attempts,
        per_call_timeout_secs: cli.per_call_timeout,
        request_deadline_secs: cli.request_deadline,
        execute_validation: cli.execute.then_some(true),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => Arc::new(config),
        Err(err) => {
            eprint!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = cli.command.name();
    let result = rt.block_on(async {
        match cli.command {
            Commands::Generate {
                prompt,
                language,
                context_file,
                model,
                template,
                output,
                json,
            } => {
                commands::execute_generate_command(
                    config,
                    GenerateOptions {
                        prompt,
                        language,
                        context_file,
                        model,
                        template,
                        output,
                        json,
                    },
                )
                .await
            }
            Commands::Plan {
                file,
                language,
                model,
                json,
            } => commands::execute_plan_command(
                config,
                file.as_deref(),
                &language,
                model.as_deref(),
                json,
            ),
            Commands::Validate {
                file,
                language,
                json,
            } => commands::execute_validate_command(&config, &file, &language, json).await,
            Commands::Models { json } => commands::execute_models_command(&config, json),
            Commands::Config { json } => commands::execute_config_command(&config, json),
        }
    });

    result.map_err(|err| report_error(&err, operation))
}

/// Print `err` for the user and pick the exit code for it
fn report_error(err: &anyhow::Error, operation: &str) -> ExitCode {
    if let Some(AlreadyReported(code)) = err.downcast_ref::<AlreadyReported>() {
        return *code;
    }
    if let Some(failure) = err.downcast_ref::<GenerationFailure>() {
        eprint!("{}", failure.display_for_user());
        return failure.exit_code();
    }
    if let Some(error) = err.downcast_ref::<CodeforgeError>() {
        eprint!("{}", error.display_for_user());
        return error.to_exit_code();
    }
    if let Some(error) = err.downcast_ref::<PlanError>() {
        eprintln!("Error: {error}");
        return ExitCode::TOKEN_BUDGET;
    }
    if let Some(error) = err.downcast_ref::<RequestError>() {
        eprintln!("Error: {error}");
        return ExitCode::CLI_ARGS;
    }

    eprintln!(
        "Error: {operation} failed: {}",
        redact_error_message(&format!("{err:#}"))
    );
    ExitCode::INTERNAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_reported_keeps_code() {
        let err = anyhow::Error::new(AlreadyReported(ExitCode::VALIDATION_FAILED));
        assert_eq!(report_error(&err, "validate"), ExitCode::VALIDATION_FAILED);
    }

    #[test]
    fn test_request_and_io_errors() {
        let err = anyhow::Error::new(RequestError::EmptyPrompt);
        assert_eq!(report_error(&err, "generate"), ExitCode::CLI_ARGS);

        let err = anyhow::anyhow!("disk on fire").context("Failed to write out.py");
        assert_eq!(report_error(&err, "generate"), ExitCode::INTERNAL);
    }

    #[test]
    fn test_codeforge_error_uses_its_exit_code() {
        let err = anyhow::Error::new(CodeforgeError::Plan(PlanError::EmptyBudget {
            effective_limit: 100,
            reserve: 100,
        }));
        assert_eq!(report_error(&err, "plan"), ExitCode::TOKEN_BUDGET);
    }
}
