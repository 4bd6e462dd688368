//! CLI command implementations (facade).
//!
//! This module re-exports the command surface used by `run.rs`.
//! Implementations live in `commands/*`.

mod common;
mod generate;
mod inspect;
mod plan;
mod validate;

pub use common::AlreadyReported;
pub use generate::{GenerateOptions, execute_generate_command};
pub use inspect::{execute_config_command, execute_models_command};
pub use plan::execute_plan_command;
pub use validate::execute_validate_command;
