//! Token budgeting for model calls
//!
//! Token counts come from the cl100k_base BPE encoder, padded so that
//! models with other vocabularies are still over-estimated. Exceeding a
//! provider's real limit fails the whole call, so the estimate always errs
//! high. A byte-ratio estimate is used only when the encoder cannot load.

mod budget;
mod estimator;
mod tokenizer;

pub use budget::TokenBudget;
pub use estimator::{
    OVERLAP_ALLOWANCE, TOKEN_PAD_DIVISOR, TokenBudgetEstimator, estimate_tokens,
    estimate_tokens_by_bytes, max_bytes_within,
};
pub use tokenizer::{count_tokens, tokenizer_available};
