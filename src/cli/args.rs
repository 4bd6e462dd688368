//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and the `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// codeforge - chunked, failover-aware LLM code generation
#[derive(Parser, Debug)]
#[command(name = "codeforge")]
#[command(about = "Generate validated code from natural-language prompts using a pool of LLMs")]
#[command(long_about = r#"
codeforge splits large requests into chunks that fit every configured model,
routes each chunk to the healthiest model by priority, validates the assembled
code, and feeds validation errors back into a bounded fix loop.

EXAMPLES:
  # Generate Python from an inline prompt
  codeforge generate "A CLI that counts words in a file" --language python

  # Read the prompt from stdin and write the code to a file
  cat request.md | codeforge generate --language js --output app.js

  # Preview how a large request would be chunked, without calling any model
  codeforge plan request.md --language python --json

  # Check an existing file with the configured validators
  codeforge validate script.py --language python

  # Inspect models and the effective configuration
  codeforge models
  codeforge config

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  The config file is discovered by searching upward from the current directory
  for codeforge.toml or .codeforge/config.toml
  Use --config to specify an explicit config file path

EXIT CODES:
  0 success, 1 internal error, 2 invalid arguments or configuration,
  3 validation failed, 4 token budget exceeded, 5 model failure,
  10 timeout, 130 cancelled
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Maximum generate/validate iterations per request
    #[arg(long, global = true)]
    pub max_iterations: Option<u32>,

    /// Attempts per chunk across models before giving up
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Whole-request deadline in seconds
    #[arg(long, global = true)]
    pub request_deadline: Option<u64>,

    /// Timeout for a single model call in seconds
    #[arg(long, global = true)]
    pub per_call_timeout: Option<u64>,

    /// Tokens reserved below each model's hard limit
    #[arg(long, global = true)]
    pub safety_buffer: Option<usize>,

    /// Run generated code with the configured interpreter after syntax checks
    #[arg(long, global = true)]
    pub execute: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate code for a prompt
    ///
    /// Progress is reported on stderr; the generated code goes to stdout
    /// (or --output). Ctrl-C cancels the request.
    ///
    /// EXAMPLES:
    ///   codeforge generate "Fetch a URL and print the status code" -l python
    ///   echo "A debounce helper" | codeforge generate -l ts --json
    Generate {
        /// Natural-language request (read from stdin when omitted)
        prompt: Option<String>,

        /// Target language (python, javascript, typescript, html, css, rust, ...)
        #[arg(short, long, default_value = "python")]
        language: String,

        /// File whose contents are sent as supporting context
        #[arg(long)]
        context_file: Option<PathBuf>,

        /// Preferred model, used while it is healthy
        #[arg(long)]
        model: Option<String>,

        /// Built-in template to shape the output (e.g. function, class, api_endpoint, page)
        #[arg(short, long)]
        template: Option<String>,

        /// Write the generated code to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit the full result (or failure) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how an input would be chunked, without calling any model
    Plan {
        /// Input file (read from stdin when omitted)
        file: Option<PathBuf>,

        /// Target language
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Plan against this model's budget instead of the smallest
        #[arg(long)]
        model: Option<String>,

        /// Output the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate an existing source file
    Validate {
        /// File to validate
        file: PathBuf,

        /// Language of the file
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Output the validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured models with their effective budgets
    Models {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration and where each value came from
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Operation name used in error reports and logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Plan { .. } => "plan",
            Self::Validate { .. } => "validate",
            Self::Models { .. } => "models",
            Self::Config { .. } => "config",
        }
    }
}

/// Build the clap command (for completions and tests)
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
