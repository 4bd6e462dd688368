//! Chunk planning for oversized generation requests.
//!
//! [`ChunkPlanner`] splits the planning input (prompt plus optional prior code)
//! into an ordered sequence of [`Chunk`]s that each fit a [`TokenBudget`],
//! cutting only at semantic boundaries unless no such boundary exists.
//! [`OutputAssembler`] merges per-chunk model outputs back into one artifact.
//!
//! [`TokenBudget`]: codeforge_budget::TokenBudget

mod assemble;
mod chunk;
mod planner;
mod segment;
mod window;

pub use assemble::OutputAssembler;
pub use chunk::{Chunk, ChunkPlan, reassemble};
pub use planner::{ChunkPlanner, planning_input};
pub use segment::{ContentKind, SyntaxHints};
pub use window::trailing_window;
