//! End-to-end pipeline scenarios through the public API
//!
//! Models are scripted in-process; no network access is needed.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use codeforge::{
    AttemptOutcome, CancellationToken, CompositeValidator, Config, Diagnostic, ExitCode,
    FailureCause, GenerationOrchestrator, GenerationRequest, Language, LlmError, ModelBackend,
    ModelRouter, ProgressEmitter, ProgressEvent, Stage, ValidationReport, Validator,
};
use codeforge_llm::{ScriptedBackend, ScriptedReply};
use codeforge_validation::ScriptedValidator;

fn orchestrator_with(
    config: Config,
    router: Arc<ModelRouter>,
    backend: Arc<ScriptedBackend>,
    validator: Arc<dyn Validator>,
) -> GenerationOrchestrator {
    GenerationOrchestrator::new(
        Arc::new(config),
        router,
        backend as Arc<dyn ModelBackend>,
        validator,
    )
    .unwrap()
}

fn python(prompt: &str) -> GenerationRequest {
    GenerationRequest::new(prompt, Language::Python).unwrap()
}

/// Backend whose every answer differs from the previous one
fn counting_backend() -> Arc<ScriptedBackend> {
    let counter = Arc::new(AtomicUsize::new(0));
    Arc::new(ScriptedBackend::new().with_fallback(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        ScriptedReply::text(format!("value = {n}"))
    }))
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_fix_loop_repairs_invalid_python() {
    let config = Config::minimal_for_testing();
    let router = Arc::new(ModelRouter::from_config(&config));
    let validator: Arc<dyn Validator> = Arc::new(CompositeValidator::from_config(&config));
    let backend = Arc::new(ScriptedBackend::new());
    backend.push(
        "alpha",
        ScriptedReply::text("Here you go:\n```python\ndef area(r)\n    return 3.14 * r * r\n```"),
    );
    backend.push(
        "alpha",
        ScriptedReply::text(
            "```python\nimport math\n\ndef area(r):\n    return math.pi * r * r\n```",
        ),
    );
    let orchestrator = orchestrator_with(config, router, Arc::clone(&backend), validator);

    let result = orchestrator
        .run(
            python("Compute the area of a circle"),
            CancellationToken::new(),
            ProgressEmitter::disabled(),
        )
        .await
        .unwrap();

    assert_eq!(result.iterations_used, 1);
    assert_eq!(
        result.code,
        "import math\n\ndef area(r):\n    return math.pi * r * r"
    );
    assert!(result.final_validation.is_valid);
    assert_eq!(result.dependencies, vec!["math".to_string()]);

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    let fix = calls[1].prompt();
    assert!(fix.starts_with("Fix the following python code error:"));
    assert!(fix.contains("Error Type: Syntax error"));
    assert!(fix.contains("Error Message: "));
    assert!(fix.contains("def area(r)\n    return 3.14 * r * r"));
}

#[tokio::test(start_paused = true)]
async fn test_progress_stream_follows_the_state_machine() {
    let config = Config::minimal_for_testing();
    let router = Arc::new(ModelRouter::from_config(&config));
    let validator = Arc::new(ScriptedValidator::new());
    validator.push(ValidationReport::failed(Diagnostic::syntax("unexpected indent")));
    let orchestrator = orchestrator_with(
        config,
        router,
        counting_backend(),
        Arc::clone(&validator) as Arc<dyn Validator>,
    );

    let request = python("Print a greeting");
    let request_id = request.id.clone();
    let (progress, mut rx) = ProgressEmitter::channel(64);
    orchestrator
        .run(request, CancellationToken::new(), progress)
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert!(events.iter().all(|e| e.request_id == request_id));
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));

    let mut stages: Vec<Stage> = events.iter().map(|e| e.stage).collect();
    stages.dedup();
    assert_eq!(
        stages,
        vec![
            Stage::Planning,
            Stage::Generating,
            Stage::Validating,
            Stage::Fixing,
            Stage::Generating,
            Stage::Validating,
            Stage::Succeeded,
        ]
    );
    assert!(
        events
            .iter()
            .any(|e| e.stage == Stage::Generating && e.chunk_index == Some(0))
    );
}

#[tokio::test(start_paused = true)]
async fn test_fix_loop_is_bounded_for_every_iteration_limit() {
    for max_iterations in 0..=3u32 {
        let mut config = Config::minimal_for_testing();
        config.pipeline.max_iterations = max_iterations;
        let router = Arc::new(ModelRouter::from_config(&config));
        let validator = Arc::new(ScriptedValidator::always(ValidationReport::failed(
            Diagnostic::syntax("invalid syntax").at_line(1),
        )));
        let orchestrator = orchestrator_with(
            config,
            router,
            counting_backend(),
            Arc::clone(&validator) as Arc<dyn Validator>,
        );

        let (progress, mut rx) = ProgressEmitter::channel(64);
        let failure = orchestrator
            .run(python("Anything"), CancellationToken::new(), progress)
            .await
            .unwrap_err();

        assert_eq!(failure.cause, FailureCause::ValidationFailed);
        assert_eq!(failure.exit_code(), ExitCode::VALIDATION_FAILED);
        assert_eq!(failure.iterations_used, max_iterations);
        assert_eq!(validator.call_count(), max_iterations as usize + 1);
        assert!(failure.partial_code.is_some());
        assert!(!failure.last_validation.as_ref().unwrap().is_valid);

        let fixes = drain(&mut rx)
            .iter()
            .filter(|e| e.stage == Stage::Fixing && e.chunk_index.is_none())
            .count();
        assert_eq!(fixes, max_iterations as usize);
    }
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_model_is_skipped_until_its_window_elapses() {
    let config = Config::minimal_for_testing();
    let router = Arc::new(ModelRouter::from_config(&config));
    let backend = Arc::new(ScriptedBackend::new());
    let validator: Arc<dyn Validator> = Arc::new(ScriptedValidator::new());
    let orchestrator = orchestrator_with(
        config,
        Arc::clone(&router),
        Arc::clone(&backend),
        validator,
    );
    let outage = || ScriptedReply::Error(LlmError::ProviderOutage("503".to_string()));

    // Two requests, each failing over from alpha to beta
    for n in 0..2 {
        backend.push("alpha", outage());
        backend.push("beta", ScriptedReply::text(format!("fallback = {n}")));
        let result = orchestrator
            .run(python("Request"), CancellationToken::new(), ProgressEmitter::disabled())
            .await
            .unwrap();
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[1].model_used, "beta");
    }

    let alpha = router.descriptor("alpha").unwrap();
    assert!(!alpha.is_healthy);
    assert_eq!(alpha.consecutive_failures, 2);
    assert_eq!(router.select(&HashSet::new()).unwrap().name, "beta");

    // While the window is open alpha is never called
    backend.push("beta", ScriptedReply::text("during_window = True"));
    let during = orchestrator
        .run(python("Request"), CancellationToken::new(), ProgressEmitter::disabled())
        .await
        .unwrap();
    let trail: Vec<(&str, AttemptOutcome)> = during
        .attempts
        .iter()
        .map(|a| (a.model_used.as_str(), a.outcome))
        .collect();
    assert_eq!(trail, vec![("beta", AttemptOutcome::Success)]);

    tokio::time::advance(Duration::from_secs(10)).await;

    backend.push("alpha", ScriptedReply::text("recovered = True"));
    let after = orchestrator
        .run(python("Request"), CancellationToken::new(), ProgressEmitter::disabled())
        .await
        .unwrap();
    assert_eq!(after.attempts[0].model_used, "alpha");
    assert_eq!(after.code, "recovered = True");

    let alpha = router.descriptor("alpha").unwrap();
    assert!(alpha.is_healthy);
    assert_eq!(alpha.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_provider_retry_after_opens_the_window_immediately() {
    let config = Config::minimal_for_testing();
    let router = Arc::new(ModelRouter::from_config(&config));
    let backend = Arc::new(ScriptedBackend::new());
    backend.push(
        "alpha",
        ScriptedReply::Error(LlmError::ProviderQuota {
            message: "429 Too Many Requests".to_string(),
            retry_after: Some(Duration::from_secs(30)),
        }),
    );
    backend.push("beta", ScriptedReply::text("x = 1"));
    let orchestrator = orchestrator_with(
        config,
        Arc::clone(&router),
        backend,
        Arc::new(ScriptedValidator::new()),
    );

    orchestrator
        .run(python("Request"), CancellationToken::new(), ProgressEmitter::disabled())
        .await
        .unwrap();

    let status = router
        .snapshot()
        .into_iter()
        .find(|s| s.name == "alpha")
        .unwrap();
    assert!(!status.is_healthy);
    assert_eq!(status.consecutive_failures, 1);
    assert_eq!(status.unhealthy_for_secs, Some(30));
    assert_eq!(status.usage.transient_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_router() {
    let config = Config::minimal_for_testing();
    let router = Arc::new(ModelRouter::from_config(&config));
    let orchestrator = orchestrator_with(
        config,
        Arc::clone(&router),
        counting_backend(),
        Arc::new(ScriptedValidator::new()),
    );

    let run = || {
        orchestrator.run(
            python("Independent request"),
            CancellationToken::new(),
            ProgressEmitter::disabled(),
        )
    };
    let (a, b, c, d) = tokio::join!(run(), run(), run(), run());

    let mut codes: Vec<String> = [a, b, c, d]
        .into_iter()
        .map(|r| r.unwrap().code)
        .collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 4);

    let alpha = router
        .snapshot()
        .into_iter()
        .find(|s| s.name == "alpha")
        .unwrap();
    assert_eq!(alpha.usage.calls, 4);
    assert_eq!(alpha.usage.successes, 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_a_hanging_call() {
    let config = Config::minimal_for_testing();
    let router = Arc::new(ModelRouter::from_config(&config));
    let backend = Arc::new(ScriptedBackend::new());
    backend.push("alpha", ScriptedReply::Hang);
    let orchestrator = orchestrator_with(
        config,
        router,
        backend,
        Arc::new(ScriptedValidator::new()),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let failure = orchestrator
        .run(python("Request"), cancel, ProgressEmitter::disabled())
        .await
        .unwrap_err();

    assert_eq!(failure.cause, FailureCause::Cancelled);
    assert_eq!(failure.exit_code(), ExitCode::CANCELLED);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(failure.partial_code.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_template_shapes_every_call() {
    let config = Config::minimal_for_testing();
    let router = Arc::new(ModelRouter::from_config(&config));
    let validator = Arc::new(ScriptedValidator::new());
    validator.push(ValidationReport::failed(Diagnostic::syntax("missing docstring")));
    let backend = counting_backend();
    let orchestrator = orchestrator_with(
        config,
        router,
        Arc::clone(&backend),
        Arc::clone(&validator) as Arc<dyn Validator>,
    );

    let request = python("A function that parses a date").with_template("function").unwrap();
    let result = orchestrator
        .run(request, CancellationToken::new(), ProgressEmitter::disabled())
        .await
        .unwrap();
    assert_eq!(result.iterations_used, 1);

    // The generation call and the fix call both carry the template
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    for call in &calls {
        let system = &call.messages[0];
        assert!(system.content.contains("Use this template structure"));
        assert!(system.content.contains("def {function_name}({parameters}):"));
    }
}
