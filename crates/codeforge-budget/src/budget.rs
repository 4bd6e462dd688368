use serde::Serialize;

use codeforge_utils::BudgetError;

/// Per-model token budget: the hard limit minus a safety buffer.
///
/// Constructed once per model and never mutated. `effective_limit` is always
/// positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBudget {
    max_tokens: usize,
    safety_buffer: usize,
    effective_limit: usize,
}

impl TokenBudget {
    /// Derive a budget for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::NonPositiveLimit`] when the buffer consumes the
    /// whole limit.
    pub fn new(model: &str, max_tokens: usize, safety_buffer: usize) -> Result<Self, BudgetError> {
        match max_tokens.checked_sub(safety_buffer) {
            Some(effective_limit) if effective_limit > 0 => Ok(Self {
                max_tokens,
                safety_buffer,
                effective_limit,
            }),
            _ => Err(BudgetError::NonPositiveLimit {
                model: model.to_string(),
                max_tokens,
                safety_buffer,
            }),
        }
    }

    #[must_use]
    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    #[must_use]
    pub const fn safety_buffer(&self) -> usize {
        self.safety_buffer
    }

    /// Usable tokens per call
    #[must_use]
    pub const fn effective_limit(&self) -> usize {
        self.effective_limit
    }

    /// Check whether `tokens` fit within the effective limit
    #[must_use]
    pub const fn fits_tokens(&self, tokens: usize) -> bool {
        tokens <= self.effective_limit
    }

    /// Tokens left for the completion once `prompt_tokens` are spent.
    ///
    /// Never returns zero: a call that leaves no room for output is still
    /// allowed one token so the provider reports the overflow itself.
    #[must_use]
    pub const fn remaining_after(&self, prompt_tokens: usize) -> usize {
        if prompt_tokens >= self.effective_limit {
            1
        } else {
            self.effective_limit - prompt_tokens
        }
    }
}
