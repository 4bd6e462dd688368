use std::collections::BTreeMap;

use tracing::debug;

use codeforge_config::{BudgetConfig, Config, ModelConfig};
use codeforge_utils::BudgetError;

use crate::TokenBudget;
use crate::tokenizer::count_tokens;

/// One padding token is added per this many counted tokens, plus one.
///
/// The default models do not all share the cl100k_base vocabulary, so the
/// count is a proxy; the padding absorbs the divergence.
pub const TOKEN_PAD_DIVISOR: usize = 10;

/// Bound on how much the estimate of a concatenation may undershoot the sum
/// of the estimates of its parts.
///
/// Joining two texts can merge the BPE pieces that meet at the seam, and
/// each part carries its own padding token.
pub const OVERLAP_ALLOWANCE: usize = 8;

/// Estimate tokens for `text`.
///
/// Counts with the cl100k_base encoder and pads the count by one token per
/// [`TOKEN_PAD_DIVISOR`] plus one. When the encoder is unavailable this falls
/// back to [`estimate_tokens_by_bytes`] with `chars_per_token`. Empty text
/// costs nothing.
#[must_use]
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    if text.is_empty() {
        return 0;
    }
    match count_tokens(text) {
        Some(count) => count + count / TOKEN_PAD_DIVISOR + 1,
        None => estimate_tokens_by_bytes(text, chars_per_token),
    }
}

/// Byte-ratio estimate: `ceil(bytes / chars_per_token) + 1`.
///
/// A zero divisor is treated as one byte per token.
#[must_use]
pub fn estimate_tokens_by_bytes(text: &str, chars_per_token: usize) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(chars_per_token.max(1)) + 1
}

/// Longest byte length whose estimate stays within `tokens` for any text.
///
/// The encoder never produces more tokens than bytes and the byte fallback
/// never charges more than one token per byte.
#[must_use]
pub fn max_bytes_within(tokens: usize) -> usize {
    let Some(budget) = tokens.checked_sub(1) else {
        return 0;
    };
    let mut bytes = budget;
    while bytes + bytes / TOKEN_PAD_DIVISOR > budget {
        bytes -= 1;
    }
    bytes
}

#[derive(Debug, Clone, Copy)]
struct ModelBudget {
    budget: TokenBudget,
    chars_per_token: usize,
}

/// Deterministic, side-effect free token estimator over the configured models.
///
/// Unknown model names resolve to the most conservative assumption: the
/// smallest configured `max_tokens` and the smallest bytes-per-token ratio.
#[derive(Debug, Clone)]
pub struct TokenBudgetEstimator {
    models: BTreeMap<String, ModelBudget>,
    fallback: ModelBudget,
    output_reserve: usize,
}

impl TokenBudgetEstimator {
    /// Build an estimator from an explicit model list.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::NoModels`] for an empty list and
    /// [`BudgetError::NonPositiveLimit`] for any model whose buffer consumes its limit.
    pub fn new(models: &[ModelConfig], budget: &BudgetConfig) -> Result<Self, BudgetError> {
        let mut table = BTreeMap::new();
        let mut smallest: Option<TokenBudget> = None;
        let mut min_chars = budget.chars_per_token.max(1);

        for model in models {
            let token_budget = TokenBudget::new(&model.name, model.max_tokens, budget.safety_buffer)?;
            let chars_per_token = model
                .chars_per_token
                .unwrap_or(budget.chars_per_token)
                .max(1);
            min_chars = min_chars.min(chars_per_token);

            if smallest.is_none_or(|s| token_budget.max_tokens() < s.max_tokens()) {
                smallest = Some(token_budget);
            }

            table.insert(
                model.name.clone(),
                ModelBudget {
                    budget: token_budget,
                    chars_per_token,
                },
            );
        }

        let smallest = smallest.ok_or(BudgetError::NoModels)?;
        Ok(Self {
            models: table,
            fallback: ModelBudget {
                budget: smallest,
                chars_per_token: min_chars,
            },
            output_reserve: budget.output_reserve,
        })
    }

    /// Build an estimator from the process configuration
    pub fn from_config(config: &Config) -> Result<Self, BudgetError> {
        Self::new(&config.models, &config.budget)
    }

    fn lookup(&self, model: &str) -> ModelBudget {
        match self.models.get(model) {
            Some(entry) => *entry,
            None => {
                debug!(
                    model,
                    fallback_max_tokens = self.fallback.budget.max_tokens(),
                    "Unknown model, using most conservative budget"
                );
                self.fallback
            }
        }
    }

    /// Estimated token count of `text` when sent to `model`
    #[must_use]
    pub fn estimate(&self, text: &str, model: &str) -> usize {
        estimate_tokens(text, self.lookup(model).chars_per_token)
    }

    /// Whether `text` fits within `model`'s effective limit
    #[must_use]
    pub fn fits(&self, text: &str, model: &str) -> bool {
        let entry = self.lookup(model);
        entry
            .budget
            .fits_tokens(estimate_tokens(text, entry.chars_per_token))
    }

    /// Budget for `model`, falling back to the smallest configured budget
    #[must_use]
    pub fn budget_for(&self, model: &str) -> TokenBudget {
        self.lookup(model).budget
    }

    /// The budget every configured model can honour.
    ///
    /// Planning against this keeps a chunk valid whichever model the router
    /// ends up choosing for it.
    #[must_use]
    pub fn smallest_budget(&self) -> TokenBudget {
        self.models
            .values()
            .map(|entry| entry.budget)
            .min_by_key(TokenBudget::effective_limit)
            .unwrap_or(self.fallback.budget)
    }

    /// Estimate with the most conservative ratio across all models
    #[must_use]
    pub fn estimate_conservative(&self, text: &str) -> usize {
        estimate_tokens(text, self.fallback.chars_per_token)
    }

    /// Smallest bytes-per-token ratio across all models
    #[must_use]
    pub const fn conservative_chars_per_token(&self) -> usize {
        self.fallback.chars_per_token
    }

    /// Tokens every call keeps free for the completion
    #[must_use]
    pub const fn output_reserve(&self) -> usize {
        self.output_reserve
    }

    /// Completion tokens to request from `model` after sending `prompt`.
    ///
    /// Everything the prompt leaves of the effective limit, and never less
    /// than the output reserve (itself capped at the effective limit).
    #[must_use]
    pub fn max_output_tokens(&self, prompt: &str, model: &str) -> usize {
        let entry = self.lookup(model);
        let floor = self.output_reserve.min(entry.budget.effective_limit());
        entry
            .budget
            .remaining_after(estimate_tokens(prompt, entry.chars_per_token))
            .max(floor)
    }

    /// Whether `model` is configured
    #[must_use]
    pub fn is_known(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenizer_available;
    use proptest::prelude::*;

    fn budget_config() -> BudgetConfig {
        BudgetConfig {
            output_reserve: 256,
            ..BudgetConfig::default()
        }
    }

    fn estimator() -> TokenBudgetEstimator {
        let models = vec![
            ModelConfig::new("big", 8000, 1),
            ModelConfig::new("small", 1000, 2),
        ];
        TokenBudgetEstimator::new(&models, &budget_config()).unwrap()
    }

    #[test]
    fn test_estimate_pads_the_encoder_count() {
        assert!(tokenizer_available());
        assert_eq!(estimate_tokens("", 4), 0);
        let long = "word ".repeat(40);
        for text in ["fn main() {}", "def f():\n    return 1\n", long.as_str()] {
            let count = count_tokens(text).unwrap();
            assert_eq!(estimate_tokens(text, 4), count + count / TOKEN_PAD_DIVISOR + 1);
        }
    }

    #[test]
    fn test_dense_code_is_not_undercounted() {
        // Byte ratios badly undercount digits and punctuation
        for text in ["1 2 3 4 5 6 7 8 9 0", "x=[1,2,3];y={a:1};", "a+b-c*d/e%f"] {
            let actual = count_tokens(text).unwrap();
            let estimate = estimate_tokens(text, 4);
            assert!(estimate > actual, "{text:?}: estimate {estimate}, actual {actual}");
            assert!(estimate > estimate_tokens_by_bytes(text, 4), "{text:?}");
        }
    }

    #[test]
    fn test_byte_fallback_rounds_up_and_pads() {
        assert_eq!(estimate_tokens_by_bytes("", 4), 0);
        assert_eq!(estimate_tokens_by_bytes("a", 4), 2);
        assert_eq!(estimate_tokens_by_bytes("abcd", 4), 2);
        assert_eq!(estimate_tokens_by_bytes("abcde", 4), 3);
        // Multi-byte text is counted by bytes, not chars
        assert_eq!(estimate_tokens_by_bytes("ééé", 4), 3);
        assert_eq!(estimate_tokens_by_bytes("abc", 0), 4);
    }

    #[test]
    fn test_max_bytes_within() {
        assert_eq!(max_bytes_within(0), 0);
        assert_eq!(max_bytes_within(1), 0);
        assert_eq!(max_bytes_within(2), 1);
        assert_eq!(max_bytes_within(11), 9);
        assert_eq!(max_bytes_within(20), 18);
    }

    #[test]
    fn test_budget_for_known_and_unknown_models() {
        let est = estimator();
        assert_eq!(est.budget_for("big").effective_limit(), 7800);
        assert_eq!(est.budget_for("small").effective_limit(), 800);
        assert_eq!(est.budget_for("mystery").max_tokens(), 1000);
        assert!(est.is_known("big"));
        assert!(!est.is_known("mystery"));
        assert_eq!(est.smallest_budget().effective_limit(), 800);
    }

    #[test]
    fn test_fits_compares_against_effective_limit() {
        let est = estimator();
        let line = "value = compute(1, 2)\n";
        let mut fits = String::new();
        while est.estimate(&format!("{fits}{line}"), "small") <= 800 {
            fits.push_str(line);
        }
        let too_big = format!("{fits}{line}");

        assert!(est.fits(&fits, "small"));
        assert!(!est.fits(&too_big, "small"));
        assert!(est.fits(&too_big, "big"));
        assert!(!est.fits(&too_big, "unknown"));
    }

    #[test]
    fn test_ratio_is_only_a_fallback() {
        let mut dense = ModelConfig::new("dense", 2000, 1);
        dense.chars_per_token = Some(2);
        let models = vec![dense, ModelConfig::new("plain", 2000, 2)];
        let est = TokenBudgetEstimator::new(&models, &budget_config()).unwrap();

        let text = "let total = items.iter().sum::<u32>();";
        assert_eq!(est.estimate(text, "dense"), est.estimate(text, "plain"));
        assert_eq!(est.estimate(text, "unknown"), est.estimate_conservative(text));
        assert_eq!(est.conservative_chars_per_token(), 2);
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(
            TokenBudgetEstimator::new(&[], &BudgetConfig::default()).unwrap_err(),
            BudgetError::NoModels
        );
        let models = vec![ModelConfig::new("tiny", 150, 1)];
        assert!(matches!(
            TokenBudgetEstimator::new(&models, &BudgetConfig::default()),
            Err(BudgetError::NonPositiveLimit { .. })
        ));
    }

    #[test]
    fn test_from_config() {
        let est = TokenBudgetEstimator::from_config(&Config::minimal_for_testing()).unwrap();
        assert_eq!(est.smallest_budget().effective_limit(), 900);
        assert_eq!(est.output_reserve(), 256);
    }

    #[test]
    fn test_max_output_tokens_never_drops_below_reserve() {
        let est = estimator();
        let short = "abcd";
        assert_eq!(
            est.max_output_tokens(short, "small"),
            800 - est.estimate(short, "small")
        );
        // A prompt that fills the limit still leaves the reserve for output
        assert_eq!(est.max_output_tokens(&"x = 1\n".repeat(2000), "small"), 256);

        // The reserve never exceeds the model's effective limit
        let greedy = BudgetConfig {
            output_reserve: 5000,
            ..BudgetConfig::default()
        };
        let models = vec![ModelConfig::new("small", 1000, 1)];
        let est = TokenBudgetEstimator::new(&models, &greedy).unwrap();
        assert_eq!(est.max_output_tokens(&"x".repeat(10_000), "small"), 800);
    }

    fn code_like() -> impl Strategy<Value = String> {
        prop_oneof![
            "[ -~\n]{0,200}",
            "[a-z_]{1,12}( = |\\(|\\)|, |\\.)[0-9]{0,6}[;{}\\n ]{0,3}",
            ".{0,80}",
        ]
    }

    proptest! {
        #[test]
        fn prop_estimate_is_monotonic(a in "[ -~\n]{0,200}", b in "[ -~\n]{0,200}") {
            let joined = format!("{a}{b}");
            let whole = estimate_tokens(&joined, 4);
            let parts = estimate_tokens(&a, 4) + estimate_tokens(&b, 4);
            prop_assert!(whole + OVERLAP_ALLOWANCE >= parts);
            prop_assert!(whole + OVERLAP_ALLOWANCE >= estimate_tokens(&a, 4));
        }

        #[test]
        fn prop_estimate_never_undercounts_encoder(text in code_like()) {
            let actual = count_tokens(&text).unwrap_or(0);
            prop_assert!(estimate_tokens(&text, 4) >= actual);
            if !text.is_empty() {
                prop_assert!(estimate_tokens(&text, 4) > actual);
            }
        }

        #[test]
        fn prop_max_bytes_within_always_fits(text in ".{0,300}", tokens in 2usize..200) {
            let mut end = max_bytes_within(tokens).min(text.len());
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            prop_assert!(estimate_tokens(&text[..end], 4) <= tokens);
        }

        #[test]
        fn prop_byte_fallback_never_undercounts_bytes(text in ".{1,300}", cpt in 1usize..8) {
            prop_assert!(estimate_tokens_by_bytes(&text, cpt) * cpt >= text.len());
        }
    }
}
