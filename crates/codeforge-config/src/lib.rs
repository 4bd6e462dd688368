//! Configuration management for codeforge
//!
//! Configuration is an immutable value built once per process and passed
//! explicitly to the router, estimator and orchestrator. Precedence is
//! CLI > file > defaults. The TOML file has `[budget]`, `[chunking]`,
//! `[pipeline]`, `[router]` and `[validation]` sections plus `[[models]]` entries.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::CONFIG_FILE_NAMES;
pub use model::*;
