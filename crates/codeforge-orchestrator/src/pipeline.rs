//! The generate, validate, fix state machine for one request

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, warn};

use codeforge_budget::TokenBudgetEstimator;
use codeforge_chunker::{ChunkPlan, ChunkPlanner, OutputAssembler, planning_input};
use codeforge_config::Config;
use codeforge_llm::{BackendRegistry, ModelBackend};
use codeforge_router::{ModelRouter, Outcome};
use codeforge_utils::logging::request_span;
use codeforge_utils::{BudgetError, CodeforgeError, Language, PlanError};
use codeforge_validation::{CompositeValidator, ValidationReport, Validator, extract_dependencies};

use crate::outcome::{
    AttemptRecord, FailureCause, GenerationFailure, GenerationResult, ModelUsageSummary,
};
use crate::progress::{ProgressEmitter, RunProgress, Stage};
use crate::prompts;
use crate::request::GenerationRequest;

/// Why `drive` stopped short of success
#[derive(Debug)]
pub(crate) struct Terminal {
    pub(crate) cause: FailureCause,
    pub(crate) message: String,
}

impl Terminal {
    pub(crate) fn new(cause: FailureCause, message: impl Into<String>) -> Self {
        Self {
            cause,
            message: message.into(),
        }
    }
}

impl From<PlanError> for Terminal {
    fn from(err: PlanError) -> Self {
        Self::new(FailureCause::TokenBudgetExceeded, err.to_string())
    }
}

/// Mutable bookkeeping for one run. Never visible to the caller directly.
pub(crate) struct RunState {
    pub(crate) progress: RunProgress,
    /// Current fix iteration, 0 for the initial generation
    pub(crate) iteration: u32,
    pub(crate) attempts: Vec<AttemptRecord>,
    /// Outputs of the chunks generated so far in the current pass
    pub(crate) chunk_outputs: Vec<String>,
    /// Last fully assembled code
    pub(crate) code: Option<String>,
    pub(crate) report: Option<ValidationReport>,
}

impl RunState {
    fn new(emitter: ProgressEmitter, request_id: &str) -> Self {
        Self {
            progress: RunProgress::new(emitter, request_id),
            iteration: 0,
            attempts: Vec::new(),
            chunk_outputs: Vec::new(),
            code: None,
            report: None,
        }
    }

    pub(crate) fn record(
        &mut self,
        chunk_index: usize,
        model: &str,
        started_at: DateTime<Utc>,
        duration: Duration,
        outcome: Outcome,
        error_detail: Option<String>,
    ) {
        self.attempts.push(AttemptRecord {
            chunk_index,
            iteration: self.iteration,
            model_used: model.to_string(),
            started_at,
            duration,
            outcome: outcome.into(),
            error_detail,
        });
    }
}

/// Drives requests through planning, generation, validation and fixing.
///
/// One orchestrator serves any number of concurrent runs. The router's
/// health table is the only state shared between them.
pub struct GenerationOrchestrator {
    pub(crate) config: Arc<Config>,
    pub(crate) estimator: TokenBudgetEstimator,
    pub(crate) router: Arc<ModelRouter>,
    pub(crate) backend: Arc<dyn ModelBackend>,
    validator: Arc<dyn Validator>,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("models", &self.router.model_names())
            .field("pipeline", &self.config.pipeline)
            .finish_non_exhaustive()
    }
}

impl GenerationOrchestrator {
    /// # Errors
    ///
    /// Returns a [`BudgetError`] when a configured model has no usable budget.
    pub fn new(
        config: Arc<Config>,
        router: Arc<ModelRouter>,
        backend: Arc<dyn ModelBackend>,
        validator: Arc<dyn Validator>,
    ) -> Result<Self, BudgetError> {
        let estimator = TokenBudgetEstimator::from_config(&config)?;
        Ok(Self {
            config,
            estimator,
            router,
            backend,
            validator,
        })
    }

    /// Production wiring: HTTP backends and the configured validator
    ///
    /// # Errors
    ///
    /// Fails when budgets are invalid or the HTTP client cannot be built.
    pub fn from_config(config: Arc<Config>) -> Result<Self, CodeforgeError> {
        let router = Arc::new(ModelRouter::from_config(&config));
        let backend: Arc<dyn ModelBackend> = Arc::new(BackendRegistry::from_config(&config)?);
        let validator: Arc<dyn Validator> = Arc::new(CompositeValidator::from_config(&config));
        Ok(Self::new(config, router, backend, validator)?)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    #[must_use]
    pub fn estimator(&self) -> &TokenBudgetEstimator {
        &self.estimator
    }

    fn planner(&self, request: &GenerationRequest) -> ChunkPlanner {
        ChunkPlanner::from_config(&self.config, &self.estimator).with_prompt_overhead(
            prompts::scaffold_tokens(&request.language, request.template(), &self.estimator),
        )
    }

    fn plan_text(&self, input: &str, request: &GenerationRequest) -> Result<ChunkPlan, PlanError> {
        self.planner(request)
            .plan(input, &request.language, &self.estimator.smallest_budget())
    }

    /// The chunk plan a run of `request` would start with
    ///
    /// # Errors
    ///
    /// [`PlanError`] when the input cannot be split to fit the smallest model.
    pub fn plan(&self, request: &GenerationRequest) -> Result<ChunkPlan, PlanError> {
        let input = planning_input(&request.prompt, request.context.as_deref());
        self.plan_text(&input, request)
    }

    /// Plan against one model's budget instead of the smallest.
    ///
    /// Unknown models fall back to the most conservative budget.
    ///
    /// # Errors
    ///
    /// [`PlanError`] when the input cannot be split to fit `model`.
    pub fn plan_for_model(
        &self,
        request: &GenerationRequest,
        model: &str,
    ) -> Result<ChunkPlan, PlanError> {
        let input = planning_input(&request.prompt, request.context.as_deref());
        self.planner(request).plan(
            &input,
            &request.language,
            &self.estimator.budget_for(model),
        )
    }

    pub(crate) fn assembler(&self, language: &Language) -> OutputAssembler {
        OutputAssembler::new(
            language.clone(),
            &self.config.chunking,
            self.estimator.conservative_chars_per_token(),
        )
    }

    /// Run `request` to a terminal state.
    ///
    /// Exactly one of the two results is produced. The request deadline
    /// and `cancel` abort whatever call is in flight; progress events already
    /// sent stay sent.
    ///
    /// # Errors
    ///
    /// [`GenerationFailure`] with the best partial artifact when the run fails.
    pub async fn run(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
        progress: ProgressEmitter,
    ) -> Result<GenerationResult, GenerationFailure> {
        let span = request_span(&request.id, request.language.as_str());
        self.run_in_span(request, cancel, progress)
            .instrument(span)
            .await
    }

    async fn run_in_span(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
        progress: ProgressEmitter,
    ) -> Result<GenerationResult, GenerationFailure> {
        let mut state = RunState::new(progress, &request.id);
        let deadline = self.config.pipeline.request_deadline();
        info!(
            prompt_bytes = request.prompt.len(),
            has_context = request.context.is_some(),
            deadline_secs = deadline.as_secs(),
            "Generation started"
        );

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                Err(Terminal::new(FailureCause::Cancelled, "Request was cancelled"))
            }
            finished = tokio::time::timeout(deadline, self.drive(&request, &mut state)) => {
                finished.unwrap_or_else(|_| {
                    Err(Terminal::new(
                        FailureCause::Timeout,
                        format!("Request deadline of {}s exceeded", deadline.as_secs()),
                    ))
                })
            }
        };

        match outcome {
            Ok((code, report)) => Ok(self.succeed(request, state, code, report)),
            Err(terminal) => Err(self.fail(&request, state, terminal)),
        }
    }

    async fn drive(
        &self,
        request: &GenerationRequest,
        state: &mut RunState,
    ) -> Result<(String, ValidationReport), Terminal> {
        let language = &request.language;
        let max_iterations = self.config.pipeline.max_iterations;

        state.progress.enter(Stage::Planning, "Planning chunks");
        let mut plan = self.plan(request)?;
        info!(
            chunks = plan.len(),
            kind = plan.kind.as_str(),
            capacity = plan.capacity,
            degraded = plan.degraded_chunks,
            "Request planned"
        );

        let mut previous_digest: Option<blake3::Hash> = None;
        loop {
            state.progress.enter(
                Stage::Generating,
                format!("Generating {} chunk(s)", plan.len()),
            );
            let code = self.generate(request, &plan, state).await?;
            state.code = Some(code.clone());

            let digest = blake3::hash(code.as_bytes());
            if previous_digest == Some(digest) {
                return Err(Terminal::new(
                    FailureCause::NonConvergence,
                    format!(
                        "Fix iteration {} reproduced the previous code unchanged",
                        state.iteration
                    ),
                ));
            }
            previous_digest = Some(digest);

            state.progress.enter(Stage::Validating, "Validating generated code");
            let report = self.validate(&code, language).await?;
            state.report = Some(report.clone());

            if report.is_valid {
                return Ok((code, report));
            }
            if state.iteration >= max_iterations {
                return Err(Terminal::new(
                    FailureCause::ValidationFailed,
                    format!(
                        "{} error(s) remain after {} fix iteration(s)",
                        report.errors.len(),
                        state.iteration
                    ),
                ));
            }

            state.iteration += 1;
            let summary = report
                .primary_error()
                .map_or_else(|| "validation failed".to_string(), ToString::to_string);
            state.progress.enter(
                Stage::Fixing,
                format!("Fix iteration {} of {max_iterations}: {summary}", state.iteration),
            );
            let fix_input = prompts::fix_prompt(language, &code, &report);
            plan = self.plan_text(&fix_input, request)?;
        }
    }

    async fn validate(
        &self,
        code: &str,
        language: &Language,
    ) -> Result<ValidationReport, Terminal> {
        let limit = self.config.pipeline.validation_timeout();
        match tokio::time::timeout(limit, self.validator.validate(code, language)).await {
            Ok(report) => {
                info!(
                    valid = report.is_valid,
                    errors = report.errors.len(),
                    warnings = report.warnings.len(),
                    "Validation complete"
                );
                Ok(report)
            }
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "Validation timed out");
                Err(Terminal::new(
                    FailureCause::Timeout,
                    format!("Validation exceeded {}s", limit.as_secs()),
                ))
            }
        }
    }

    fn succeed(
        &self,
        request: GenerationRequest,
        mut state: RunState,
        code: String,
        report: ValidationReport,
    ) -> GenerationResult {
        state.progress.enter(
            Stage::Succeeded,
            format!(
                "Generated {} line(s) after {} fix iteration(s)",
                code.lines().count(),
                state.iteration
            ),
        );
        info!(
            iterations = state.iteration,
            attempts = state.attempts.len(),
            "Generation succeeded"
        );

        GenerationResult {
            request_id: request.id,
            dependencies: extract_dependencies(&code, &request.language),
            code,
            language: request.language,
            iterations_used: state.iteration,
            model_usage_summary: ModelUsageSummary::from_attempts(&state.attempts),
            final_validation: report,
            attempts: state.attempts,
        }
    }

    fn fail(
        &self,
        request: &GenerationRequest,
        mut state: RunState,
        terminal: Terminal,
    ) -> GenerationFailure {
        let failed_in = state.progress.stage().map_or("start", |s| s.as_str());
        state.progress.enter(Stage::Failed, terminal.message.clone());
        warn!(
            cause = terminal.cause.as_str(),
            stage = failed_in,
            iterations = state.iteration,
            attempts = state.attempts.len(),
            message = %terminal.message,
            "Generation failed"
        );

        let partial_code = state.code.or_else(|| {
            (!state.chunk_outputs.is_empty())
                .then(|| self.assembler(&request.language).assemble(&state.chunk_outputs))
        });

        GenerationFailure {
            request_id: request.id.clone(),
            cause: terminal.cause,
            message: terminal.message,
            partial_code,
            last_validation: state.report,
            iterations_used: state.iteration,
            model_usage_summary: ModelUsageSummary::from_attempts(&state.attempts),
            attempts: state.attempts,
        }
    }
}
