pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;
pub mod types;

pub use error::{
    BudgetError, CodeforgeError, ConfigError, ErrorCategory, LlmError, PlanError, RouterError,
    UserFriendlyError,
};
pub use exit_codes::ExitCode;
pub use types::Language;
