//! Sequential chunk generation with per-chunk failover

use std::collections::HashSet;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info};

use codeforge_chunker::ChunkPlan;
use codeforge_llm::ModelInvocation;
use codeforge_router::Outcome;
use codeforge_utils::LlmError;
use codeforge_utils::logging::log_provider_error;
use codeforge_utils::redaction::redact_error_message;

use crate::extract::extract_code;
use crate::outcome::FailureCause;
use crate::pipeline::{GenerationOrchestrator, RunState, Terminal};
use crate::prompts;
use crate::request::GenerationRequest;

impl GenerationOrchestrator {
    /// Generate every chunk of `plan` in order and assemble the outputs.
    ///
    /// Later chunks see the trailing window of the previous chunk's output,
    /// so chunks are never generated concurrently.
    pub(crate) async fn generate(
        &self,
        request: &GenerationRequest,
        plan: &ChunkPlan,
        state: &mut RunState,
    ) -> Result<String, Terminal> {
        let language = &request.language;
        let assembler = self.assembler(language);
        let system = prompts::system_prompt(language, request.template());
        let total = plan.len();
        state.chunk_outputs.clear();

        for chunk in &plan.chunks {
            let index = chunk.sequence_index;
            state
                .progress
                .notify(Some(index), format!("Generating chunk {}/{total}", index + 1));

            let carried = if chunk.carries_context {
                state
                    .chunk_outputs
                    .last()
                    .map(|previous| assembler.carried_context(previous))
            } else {
                None
            };
            let prompt = prompts::chunk_prompt(language, &chunk.text, index, total, carried);

            let output = self
                .generate_chunk(request, index, &system, prompt, state)
                .await?;
            state.chunk_outputs.push(output);
        }

        let code = assembler.assemble(&state.chunk_outputs);
        state.chunk_outputs.clear();
        Ok(code)
    }

    /// One chunk, failing over across models on transient errors.
    ///
    /// Models that failed this chunk are excluded for its remaining attempts.
    /// A fatal error ends the run at once.
    async fn generate_chunk(
        &self,
        request: &GenerationRequest,
        index: usize,
        system: &str,
        prompt: String,
        state: &mut RunState,
    ) -> Result<String, Terminal> {
        let per_call = self.config.pipeline.per_call_timeout();
        let max_attempts = self.config.pipeline.per_chunk_max_attempts.max(1);
        let hint = request.target_model_hint.as_deref();
        let sent = format!("{system}\n{prompt}");

        let mut excluded: HashSet<String> = HashSet::new();
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=max_attempts {
            let model = match self.router.select_preferring(hint, &excluded) {
                Ok(descriptor) => descriptor.name,
                Err(err) => {
                    let detail = last_error
                        .as_ref()
                        .map_or_else(String::new, |e| format!("; last error: {e}"));
                    return Err(Terminal::new(
                        FailureCause::ModelUnavailable,
                        redact_error_message(&format!(
                            "Chunk {} could not be routed: {err}{detail}",
                            index + 1
                        )),
                    ));
                }
            };

            let max_output_tokens = self.estimator.max_output_tokens(&sent, &model);
            let invocation = ModelInvocation::new(&model, prompt.clone(), max_output_tokens, per_call)
                .with_system(system);
            debug!(model = %model, chunk = index, attempt, max_output_tokens, "Invoking model");

            let started_at = Utc::now();
            let started = Instant::now();
            let result = match tokio::time::timeout(per_call, self.backend.invoke(invocation)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout { duration: per_call }),
            };
            let duration = started.elapsed();

            match result {
                Ok(completion) => {
                    self.router.report(&model, Outcome::Success);
                    state.record(index, &model, started_at, duration, Outcome::Success, None);
                    info!(
                        model = %model,
                        chunk = index,
                        attempt,
                        elapsed_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                        tokens_output = completion.tokens_output,
                        "Chunk generated"
                    );
                    return Ok(extract_code(&completion.text, &request.language));
                }
                Err(err) => {
                    let outcome = Outcome::from(&err);
                    let detail = redact_error_message(&err.to_string());
                    self.router.report(&model, outcome);
                    log_provider_error(&model, err.kind_label(), &detail);
                    state.record(index, &model, started_at, duration, outcome, Some(detail.clone()));

                    if !err.is_transient() {
                        return Err(Terminal::new(
                            FailureCause::FatalProviderError,
                            format!("Model '{model}' failed on chunk {}: {detail}", index + 1),
                        ));
                    }
                    excluded.insert(model);
                    last_error = Some(err);
                }
            }
        }

        let detail = last_error.map_or_else(String::new, |e| format!(": {e}"));
        Err(Terminal::new(
            FailureCause::TransientProviderError,
            redact_error_message(&format!(
                "Chunk {} failed after {max_attempts} attempt(s){detail}",
                index + 1
            )),
        ))
    }
}
