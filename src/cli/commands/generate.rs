//! Generate command implementation
//!
//! Handles `codeforge generate`. Progress events are rendered on stderr while
//! the run is in flight; Ctrl-C cancels the request through its token.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use super::common::{AlreadyReported, parse_language, print_json, read_input, write_code};
use crate::{
    CancellationToken, Config, GenerationOrchestrator, GenerationRequest, GenerationResult,
    ProgressEmitter, ProgressEvent,
};

/// Arguments of `codeforge generate` after parsing
#[derive(Debug)]
pub struct GenerateOptions {
    pub prompt: Option<String>,
    pub language: String,
    pub context_file: Option<PathBuf>,
    pub model: Option<String>,
    pub template: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

const PROGRESS_CAPACITY: usize = 64;

/// Execute the generate command
pub async fn execute_generate_command(config: Arc<Config>, options: GenerateOptions) -> Result<()> {
    let prompt = match options.prompt {
        Some(prompt) => prompt,
        None => read_input(None)?,
    };
    let mut request = GenerationRequest::new(prompt, parse_language(&options.language))?;
    if let Some(path) = &options.context_file {
        let context = read_input(Some(path)).context("Failed to load --context-file")?;
        request = request.with_context(context);
    }
    if let Some(model) = options.model {
        if config.model(&model).is_none() {
            warn!(model = %model, "Model hint is not a configured model and will be ignored");
        }
        request = request.with_model_hint(model);
    }
    if let Some(template) = &options.template {
        request = request.with_template(template)?;
    }

    let orchestrator = GenerationOrchestrator::from_config(config)?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let (progress, mut events) = ProgressEmitter::channel(PROGRESS_CAPACITY);
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            eprintln!("{}", render_event(&event));
        }
    });

    let outcome = orchestrator.run(request, cancel, progress).await;
    interrupt.abort();
    // The emitter was moved into the run, so the stream is closed by now
    if let Err(e) = renderer.await {
        debug!(error = %e, "Progress renderer ended abnormally");
    }

    match outcome {
        Ok(result) => {
            if options.json {
                print_json(&result)?;
            } else {
                report_success(&result, options.output.as_deref())?;
            }
            Ok(())
        }
        Err(failure) if options.json => {
            print_json(&failure)?;
            Err(AlreadyReported(failure.exit_code()).into())
        }
        Err(failure) => Err(failure.into()),
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("Interrupted, cancelling request...");
        cancel.cancel();
    }
}

fn render_event(event: &ProgressEvent) -> String {
    format!("[{}] {}", event.stage, event.message)
}

fn report_success(result: &GenerationResult, output: Option<&std::path::Path>) -> Result<()> {
    write_code(&result.code, output)?;

    for warning in &result.final_validation.warnings {
        eprintln!("  ⚠ {warning}");
    }
    if !result.dependencies.is_empty() {
        eprintln!("  Dependencies: {}", result.dependencies.join(", "));
    }
    let models = result
        .model_usage_summary
        .iter()
        .map(|(name, stats)| format!("{name} ({}/{})", stats.successes, stats.attempts))
        .collect::<Vec<_>>()
        .join(", ");
    eprintln!(
        "✓ Generated {} code ({} fix iteration(s), models: {models})",
        result.language, result.iterations_used
    );
    if let Some(path) = output {
        eprintln!("  Written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Stage;

    #[test]
    fn test_render_event() {
        let event = ProgressEvent {
            request_id: "req-1".to_string(),
            seq: 3,
            stage: Stage::Generating,
            chunk_index: Some(1),
            message: "Generating chunk 2/3".to_string(),
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(render_event(&event), "[generating] Generating chunk 2/3");
    }
}
