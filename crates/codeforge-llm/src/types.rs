//! Core types for model invocation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use codeforge_utils::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Input to one model call
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInvocation {
    /// Configured model name
    pub model: String,
    pub messages: Vec<Message>,
    /// Completion tokens to request
    pub max_output_tokens: usize,
    pub timeout: Duration,
    /// Overrides the backend's default temperature
    pub temperature: Option<f32>,
}

impl ModelInvocation {
    /// Single-prompt invocation
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        max_output_tokens: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            max_output_tokens,
            timeout,
            temperature: None,
        }
    }

    /// Prepend a system message
    #[must_use]
    pub fn with_system(mut self, content: impl Into<String>) -> Self {
        self.messages.insert(0, Message::system(content));
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Content of the last user message
    #[must_use]
    pub fn prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str())
    }
}

/// Result of a successful model call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCompletion {
    pub text: String,
    /// Provider label (e.g. "openai", "scripted")
    pub provider: String,
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

impl ModelCompletion {
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }
}

/// Capability shared by every model provider.
///
/// Implementations make exactly one attempt per call. Retrying and failover
/// belong to the router, which needs to see every failure.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn invoke(&self, invocation: ModelInvocation) -> Result<ModelCompletion, LlmError>;
}
