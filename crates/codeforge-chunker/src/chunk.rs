use serde::{Deserialize, Serialize};

use crate::ContentKind;

/// A contiguous, budget-fitting slice of the planning input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in generation order, contiguous from 0
    pub sequence_index: usize,
    pub text: String,
    /// Whether the previous chunk's trailing output window is sent along
    pub carries_context: bool,
    pub estimated_tokens: usize,
}

/// Ordered output of [`ChunkPlanner::plan`](crate::ChunkPlanner::plan)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
    pub kind: ContentKind,
    /// Effective limit of the budget planned against
    pub effective_limit: usize,
    /// Tokens available to chunk text after the context reserve
    pub capacity: usize,
    /// Chunks cut without a semantic boundary
    pub degraded_chunks: usize,
}

impl ChunkPlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn total_estimated_tokens(&self) -> usize {
        self.chunks.iter().map(|c| c.estimated_tokens).sum()
    }
}

/// Concatenate chunk texts in sequence order.
///
/// Chunks from a single plan reproduce the planning input verbatim.
#[must_use]
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.sequence_index);
    ordered.into_iter().map(|c| c.text.as_str()).collect()
}
