//! Plan command implementation
//!
//! Handles `codeforge plan`: chunk an input offline and show the result.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use super::common::{parse_language, preview, print_json, read_input};
use crate::{ChunkPlan, CodeforgeError, Config, GenerationOrchestrator, GenerationRequest};

const PREVIEW_CHARS: usize = 60;

/// Execute the plan command
pub fn execute_plan_command(
    config: Arc<Config>,
    file: Option<&Path>,
    language: &str,
    model: Option<&str>,
    json: bool,
) -> Result<()> {
    let input = read_input(file)?;
    let request = GenerationRequest::new(input, parse_language(language))?;
    let orchestrator = GenerationOrchestrator::from_config(config)?;

    let plan = match model {
        Some(model) => orchestrator.plan_for_model(&request, model),
        None => orchestrator.plan(&request),
    }
    .map_err(CodeforgeError::from)?;

    if json {
        print_json(&plan)?;
    } else {
        print!("{}", render_plan(&plan));
    }
    Ok(())
}

fn render_plan(plan: &ChunkPlan) -> String {
    let mut out = format!(
        "Plan: {} chunk(s) of {} content, effective limit {} tokens, {} available per chunk\n",
        plan.len(),
        plan.kind.as_str(),
        plan.effective_limit,
        plan.capacity
    );
    for chunk in &plan.chunks {
        out.push_str(&format!(
            "  [{}] ~{} tokens{}  {}\n",
            chunk.sequence_index + 1,
            chunk.estimated_tokens,
            if chunk.carries_context { ", carries context" } else { "" },
            preview(&chunk.text, PREVIEW_CHARS)
        ));
    }
    if plan.degraded_chunks > 0 {
        out.push_str(&format!(
            "  {} chunk(s) were cut without a semantic boundary\n",
            plan.degraded_chunks
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Chunk, ContentKind};

    #[test]
    fn test_render_plan_lists_chunks() {
        let plan = ChunkPlan {
            chunks: vec![
                Chunk {
                    sequence_index: 0,
                    text: "def a():\n    pass\n".to_string(),
                    carries_context: false,
                    estimated_tokens: 6,
                },
                Chunk {
                    sequence_index: 1,
                    text: "def b():\n    pass\n".to_string(),
                    carries_context: true,
                    estimated_tokens: 6,
                },
            ],
            kind: ContentKind::Code,
            effective_limit: 900,
            capacity: 700,
            degraded_chunks: 0,
        };
        let rendered = render_plan(&plan);
        assert!(rendered.starts_with("Plan: 2 chunk(s) of code content"));
        assert!(rendered.contains("  [2] ~6 tokens, carries context  def b(): pass"));
        assert!(!rendered.contains("semantic boundary"));
    }
}
