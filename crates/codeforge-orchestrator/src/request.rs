use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use codeforge_utils::Language;

use crate::templates::{Template, find_template, templates_for};

/// Distinguishes requests created in the same instant with the same prompt
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Rejected before a pipeline is started
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("No template named '{name}' for {language} (available: {available})")]
    UnknownTemplate {
        name: String,
        language: Language,
        available: String,
    },
}

/// One accepted generation request.
///
/// Built once and then only read; the orchestrator takes it by value for the
/// lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: String,
    pub prompt: String,
    pub language: Language,
    /// Prior code the model should build on
    pub context: Option<String>,
    /// Model to try first when it is eligible
    pub target_model_hint: Option<String>,
    /// Name of a built-in template the output should follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationRequest {
    /// # Errors
    ///
    /// [`RequestError::EmptyPrompt`] when `prompt` is blank.
    pub fn new(prompt: impl Into<String>, language: Language) -> Result<Self, RequestError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(RequestError::EmptyPrompt);
        }

        let created_at = Utc::now();
        let id = request_id(&prompt, &language, created_at);
        Ok(Self {
            id,
            prompt,
            language,
            context: None,
            target_model_hint: None,
            template: None,
            created_at,
        })
    }

    /// Attach prior code; blank context is dropped
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = (!context.trim().is_empty()).then_some(context);
        self
    }

    #[must_use]
    pub fn with_model_hint(mut self, model: impl Into<String>) -> Self {
        self.target_model_hint = Some(model.into());
        self
    }

    /// Ask for output shaped like the built-in template `name`
    ///
    /// # Errors
    ///
    /// [`RequestError::UnknownTemplate`] when the request's language has no
    /// template by that name.
    pub fn with_template(mut self, name: &str) -> Result<Self, RequestError> {
        let template = find_template(&self.language, name).ok_or_else(|| {
            let names: Vec<&str> = templates_for(&self.language).iter().map(|t| t.name).collect();
            RequestError::UnknownTemplate {
                name: name.to_string(),
                language: self.language.clone(),
                available: if names.is_empty() {
                    "none".to_string()
                } else {
                    names.join(", ")
                },
            }
        })?;
        self.template = Some(template.name.to_string());
        Ok(self)
    }

    /// The template this request follows, if any
    #[must_use]
    pub fn template(&self) -> Option<&'static Template> {
        self.template
            .as_deref()
            .and_then(|name| find_template(&self.language, name))
    }
}

/// `req-` followed by 16 hex digits of a BLAKE3 digest
fn request_id(prompt: &str, language: &Language, created_at: DateTime<Utc>) -> String {
    let sequence = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    hasher.update(prompt.as_bytes());
    hasher.update(language.as_str().as_bytes());
    hasher.update(created_at.to_rfc3339().as_bytes());
    hasher.update(&sequence.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    format!("req-{}", &hex[..16])
}
