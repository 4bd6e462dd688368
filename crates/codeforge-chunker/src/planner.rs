use std::ops::Range;

use tracing::{debug, warn};

use codeforge_budget::{TokenBudget, TokenBudgetEstimator, estimate_tokens, max_bytes_within};
use codeforge_config::{ChunkingConfig, Config};
use codeforge_utils::{Language, PlanError};

use crate::segment::{self, ContentKind, SyntaxHints};
use crate::{Chunk, ChunkPlan};

/// Join the request prompt and optional prior code into the text that gets planned
#[must_use]
pub fn planning_input(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => format!("{prompt}\n\n{ctx}"),
        _ => prompt.to_string(),
    }
}

#[derive(Debug, Clone)]
struct Piece {
    range: Range<usize>,
    degraded: bool,
}

/// Splits planning input into budget-fitting chunks.
///
/// Every chunk leaves room for the carried context window, the fixed prompt
/// overhead and the completion, so the same capacity applies to all chunks. Planning is
/// deterministic for a given input, language and budget.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    chunking: ChunkingConfig,
    chars_per_token: usize,
    prompt_overhead: usize,
    output_reserve: usize,
}

impl ChunkPlanner {
    #[must_use]
    pub fn new(chunking: ChunkingConfig, chars_per_token: usize) -> Self {
        Self {
            chunking,
            chars_per_token: chars_per_token.max(1),
            prompt_overhead: 0,
            output_reserve: 0,
        }
    }

    /// Planner using the configured window and output reserve, and the
    /// estimator's most conservative ratio
    #[must_use]
    pub fn from_config(config: &Config, estimator: &TokenBudgetEstimator) -> Self {
        Self::new(
            config.chunking.clone(),
            estimator.conservative_chars_per_token(),
        )
        .with_output_reserve(config.budget.output_reserve)
    }

    /// Reserve tokens for prompt scaffolding sent with every chunk
    #[must_use]
    pub const fn with_prompt_overhead(mut self, tokens: usize) -> Self {
        self.prompt_overhead = tokens;
        self
    }

    /// Keep tokens free in every chunk for the model's completion
    #[must_use]
    pub const fn with_output_reserve(mut self, tokens: usize) -> Self {
        self.output_reserve = tokens;
        self
    }

    #[must_use]
    pub const fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    #[must_use]
    pub const fn chars_per_token(&self) -> usize {
        self.chars_per_token
    }

    /// Tokens reserved in every chunk for context, prompt scaffolding and output
    #[must_use]
    pub const fn reserve(&self) -> usize {
        self.chunking.context_tokens + self.prompt_overhead + self.output_reserve
    }

    /// Tokens available to chunk text under `budget`
    #[must_use]
    pub const fn capacity(&self, budget: &TokenBudget) -> usize {
        budget.effective_limit().saturating_sub(self.reserve())
    }

    fn estimate(&self, text: &str) -> usize {
        estimate_tokens(text, self.chars_per_token)
    }

    /// Plan `input` against `budget`.
    ///
    /// # Errors
    ///
    /// [`PlanError::EmptyBudget`] when the reserve leaves no room for text, and
    /// [`PlanError::TokenBudgetExceeded`] when a unit cannot be split to fit.
    pub fn plan(
        &self,
        input: &str,
        language: &Language,
        budget: &TokenBudget,
    ) -> Result<ChunkPlan, PlanError> {
        let capacity = self.capacity(budget);
        // Any non-empty text costs at least two tokens
        if capacity < 2 {
            return Err(PlanError::EmptyBudget {
                effective_limit: budget.effective_limit(),
                reserve: self.reserve(),
            });
        }

        let kind = ContentKind::classify(input);
        let hints = SyntaxHints::for_language(language);
        let units = segment::units(input, kind, hints);

        let mut pieces = Vec::with_capacity(units.len());
        for (unit_index, unit) in units.iter().enumerate() {
            if self.estimate(&input[unit.clone()]) <= capacity {
                pieces.push(Piece {
                    range: unit.clone(),
                    degraded: false,
                });
            } else {
                self.subdivide(input, unit.clone(), unit_index, capacity, &mut pieces)?;
            }
        }

        let chunks = self.pack(input, &pieces, capacity);
        let degraded_chunks = chunks.iter().filter(|(_, degraded)| *degraded).count();
        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(sequence_index, (range, degraded))| {
                let text = &input[range];
                Chunk {
                    sequence_index,
                    text: text.to_string(),
                    carries_context: sequence_index > 0 && !degraded,
                    estimated_tokens: self.estimate(text),
                }
            })
            .collect();

        debug!(
            kind = kind.as_str(),
            units = units.len(),
            chunks = chunks.len(),
            capacity,
            degraded_chunks,
            "Planned chunks"
        );

        Ok(ChunkPlan {
            chunks,
            kind,
            effective_limit: budget.effective_limit(),
            capacity,
            degraded_chunks,
        })
    }

    /// Split an oversized unit at lines, then sentences and words, then chars
    fn subdivide(
        &self,
        input: &str,
        unit: Range<usize>,
        unit_index: usize,
        capacity: usize,
        out: &mut Vec<Piece>,
    ) -> Result<(), PlanError> {
        let fits = |range: &Range<usize>| self.estimate(&input[range.clone()]) <= capacity;
        let exceeded = || PlanError::TokenBudgetExceeded {
            unit_index,
            estimated_tokens: self.estimate(&input[unit.clone()]),
            limit: capacity,
        };
        let max_bytes = max_bytes_within(capacity);
        let mut warned = false;
        let mut forced = false;

        for line in segment::line_ranges(input, unit.clone()) {
            if fits(&line) {
                out.push(Piece {
                    range: line,
                    degraded: false,
                });
                continue;
            }

            if !warned {
                warn!(
                    unit_index,
                    estimated_tokens = self.estimate(&input[unit.clone()]),
                    limit = capacity,
                    "No semantic split point fits the budget; splitting at sentence and word boundaries"
                );
                warned = true;
            }

            for sentence in segment::sentence_ranges(input, line) {
                if fits(&sentence) {
                    out.push(Piece {
                        range: sentence,
                        degraded: true,
                    });
                    continue;
                }
                for word in segment::word_ranges(input, sentence) {
                    if fits(&word) {
                        out.push(Piece {
                            range: word,
                            degraded: true,
                        });
                        continue;
                    }
                    if !self.chunking.allow_forced_splits {
                        return Err(exceeded());
                    }
                    if !forced {
                        warn!(unit_index, limit = capacity, "Forcing split inside a token run");
                        forced = true;
                    }
                    for piece in segment::forced_ranges(input, word, max_bytes) {
                        if !fits(&piece) {
                            return Err(exceeded());
                        }
                        out.push(Piece {
                            range: piece,
                            degraded: true,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Greedily merge contiguous pieces while the merged text still fits
    fn pack(&self, input: &str, pieces: &[Piece], capacity: usize) -> Vec<(Range<usize>, bool)> {
        let mut chunks = Vec::new();
        let mut current: Option<(Range<usize>, bool)> = None;

        for piece in pieces {
            current = match current.take() {
                Some((range, degraded))
                    if self.estimate(&input[range.start..piece.range.end]) <= capacity =>
                {
                    Some((range.start..piece.range.end, degraded || piece.degraded))
                }
                Some(done) => {
                    chunks.push(done);
                    Some((piece.range.clone(), piece.degraded))
                }
                None => Some((piece.range.clone(), piece.degraded)),
            };
        }
        if let Some(done) = current {
            chunks.push(done);
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reassemble;
    use proptest::prelude::*;

    fn planner(context_tokens: usize, allow_forced_splits: bool) -> ChunkPlanner {
        ChunkPlanner::new(
            ChunkingConfig {
                context_lines: 3,
                context_tokens,
                allow_forced_splits,
            },
            4,
        )
    }

    fn budget(effective: usize) -> TokenBudget {
        TokenBudget::new("m", effective + 10, 10).unwrap()
    }

    fn python_program(functions: usize) -> String {
        (0..functions)
            .map(|i| format!("def f{i}(x):\n    return x + {i}\n\n"))
            .collect()
    }

    #[test]
    fn test_small_input_is_single_chunk() {
        let plan = planner(10, true)
            .plan("print('hi')\n", &Language::Python, &budget(100))
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert!(!plan.chunks[0].carries_context);
        assert_eq!(plan.capacity, 90);
        assert_eq!(plan.degraded_chunks, 0);
    }

    #[test]
    fn test_splits_at_function_boundaries() {
        let input = python_program(6);
        // One function fits in 20 tokens of capacity
        let plan = planner(5, true)
            .plan(&input, &Language::Python, &budget(25))
            .unwrap();

        assert_eq!(plan.kind, ContentKind::Code);
        assert!(plan.len() >= 3);
        for (i, chunk) in plan.chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert!(chunk.estimated_tokens <= plan.capacity);
            assert!(chunk.text.starts_with("def "));
            assert_eq!(chunk.carries_context, i > 0);
        }
        assert_eq!(reassemble(&plan.chunks), input);
    }

    #[test]
    fn test_oversized_unit_falls_back_to_lines() {
        let body: String = (0..20).map(|i| format!("    y{i} = {i}\n")).collect();
        let input = format!("def big():\n{body}");
        let plan = planner(0, false)
            .plan(&input, &Language::Python, &budget(20))
            .unwrap();

        assert!(plan.len() > 1);
        assert_eq!(plan.degraded_chunks, 0);
        assert!(plan.chunks[1..].iter().all(|c| c.carries_context));
        assert_eq!(reassemble(&plan.chunks), input);
    }

    #[test]
    fn test_long_line_splits_at_words_and_is_flagged() {
        let input = "word ".repeat(100);
        let plan = planner(0, false)
            .plan(&input, &Language::Other("text".into()), &budget(20))
            .unwrap();

        assert!(plan.len() > 1);
        assert_eq!(plan.degraded_chunks, plan.len());
        assert!(plan.chunks.iter().all(|c| !c.carries_context));
        assert_eq!(reassemble(&plan.chunks), input);
    }

    #[test]
    fn test_unsplittable_run_without_forced_splits_fails() {
        let input = "x".repeat(500);
        let err = planner(0, false)
            .plan(&input, &Language::Python, &budget(20))
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::TokenBudgetExceeded {
                unit_index: 0,
                estimated_tokens: estimate_tokens(&input, 4),
                limit: 20,
            }
        );
    }

    #[test]
    fn test_unsplittable_run_with_forced_splits() {
        let input = "x".repeat(500);
        let plan = planner(0, true)
            .plan(&input, &Language::Python, &budget(20))
            .unwrap();
        assert!(plan.len() > 1);
        assert_eq!(plan.degraded_chunks, plan.len());
        assert!(plan.chunks.iter().all(|c| c.estimated_tokens <= 20));
        assert!(plan.chunks[0].text.len() >= max_bytes_within(20));
        assert_eq!(reassemble(&plan.chunks), input);
    }

    #[test]
    fn test_reserve_consuming_budget_is_empty_budget() {
        let err = planner(99, true)
            .plan("x", &Language::Python, &budget(100))
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::EmptyBudget {
                effective_limit: 100,
                reserve: 99,
            }
        );

        let with_overhead = planner(50, true).with_prompt_overhead(50);
        assert_eq!(with_overhead.reserve(), 100);
        assert!(with_overhead.plan("x", &Language::Python, &budget(100)).is_err());
    }

    #[test]
    fn test_output_reserve_shrinks_capacity() {
        let planner = planner(10, true)
            .with_prompt_overhead(20)
            .with_output_reserve(256);
        assert_eq!(planner.reserve(), 286);
        assert_eq!(planner.capacity(&budget(900)), 614);

        let err = planner.plan("x", &Language::Python, &budget(280)).unwrap_err();
        assert_eq!(
            err,
            PlanError::EmptyBudget {
                effective_limit: 280,
                reserve: 286,
            }
        );
    }

    #[test]
    fn test_from_config_reserves_output() {
        let config = Config::minimal_for_testing();
        let estimator = TokenBudgetEstimator::from_config(&config).unwrap();
        let planner = ChunkPlanner::from_config(&config, &estimator);
        assert_eq!(
            planner.reserve(),
            config.chunking.context_tokens + config.budget.output_reserve
        );

        // A request of many short paragraphs still leaves the reserve free
        let input: String = (0..60)
            .map(|i| format!("Paragraph {i} asks for one more small feature.\n\n"))
            .collect();
        let budget = estimator.smallest_budget();
        let plan = planner.plan(&input, &Language::Python, &budget).unwrap();
        for chunk in &plan.chunks {
            let free = budget.effective_limit() - chunk.estimated_tokens;
            assert!(free >= config.budget.output_reserve);
        }
    }

    #[test]
    fn test_empty_input_plans_nothing() {
        let plan = planner(0, true)
            .plan("", &Language::Python, &budget(100))
            .unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_planning_input() {
        assert_eq!(planning_input("do it", None), "do it");
        assert_eq!(planning_input("do it", Some("  ")), "do it");
        assert_eq!(planning_input("do it", Some("x = 1")), "do it\n\nx = 1");
    }

    fn source_text() -> impl Strategy<Value = String> {
        let line = prop_oneof![
            Just("def f(a):".to_string()),
            Just("    return (a +".to_string()),
            Just("        1)".to_string()),
            Just("class K:".to_string()),
            Just(String::new()),
            Just("}".to_string()),
            "[a-z ]{0,60}",
            "[a-zé.!? ]{0,120}",
        ];
        prop::collection::vec(line, 0..40).prop_map(|lines| lines.join("\n"))
    }

    proptest! {
        #[test]
        fn prop_plan_round_trips_and_fits(input in source_text(), effective in 12usize..80) {
            let planner = planner(2, true);
            let budget = budget(effective);
            let plan = planner.plan(&input, &Language::Python, &budget).unwrap();

            prop_assert_eq!(reassemble(&plan.chunks), input.clone());
            for (i, chunk) in plan.chunks.iter().enumerate() {
                prop_assert_eq!(chunk.sequence_index, i);
                prop_assert!(chunk.estimated_tokens <= plan.capacity);
            }

            let again = planner.plan(&input, &Language::Python, &budget).unwrap();
            prop_assert_eq!(plan, again);
        }
    }
}
