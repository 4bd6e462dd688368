//! Exit code constants for the codeforge CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Generation succeeded |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `VALIDATION_FAILED` | Fix loop exhausted or did not converge |
//! | 4 | `TOKEN_BUDGET` | Input cannot be split to fit any model |
//! | 5 | `MODEL_FAILURE` | No model available or provider failure |
//! | 10 | `TIMEOUT` | Request deadline or call timeout exceeded |
//! | 130 | `CANCELLED` | Interrupted by the user |

/// Exit codes matching the documented exit code table.
///
/// ```rust
/// use codeforge_utils::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(3), ExitCode::VALIDATION_FAILED);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - generation completed and validated
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Validation failed - fix loop exhausted or stopped converging
    pub const VALIDATION_FAILED: ExitCode = ExitCode(3);

    /// Token budget - an atomic unit cannot fit the smallest model
    pub const TOKEN_BUDGET: ExitCode = ExitCode(4);

    /// Model failure - no eligible model, or a fatal provider error
    pub const MODEL_FAILURE: ExitCode = ExitCode(5);

    /// Timeout - request deadline exceeded
    pub const TIMEOUT: ExitCode = ExitCode(10);

    /// Cancelled - interrupted before completion
    pub const CANCELLED: ExitCode = ExitCode(130);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
