//! OpenAI-compatible chat completions backend
//!
//! Serves GitHub Models, Azure AI inference and any other endpoint that speaks
//! the `/chat/completions` wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use codeforge_config::ModelConfig;
use codeforge_utils::LlmError;

use crate::http_client::HttpClient;
use crate::types::{Message, ModelBackend, ModelCompletion, ModelInvocation};

const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Backend for one configured model on an OpenAI-compatible endpoint
#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    client: Arc<HttpClient>,
    provider: String,
    endpoint: String,
    api_key: String,
    temperature: f32,
}

impl std::fmt::Debug for OpenAiCompatibleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleBackend")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiCompatibleBackend {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        temperature: Option<f32>,
    ) -> Result<Self, LlmError> {
        Ok(Self::with_client(
            Arc::new(HttpClient::new()?),
            provider.into(),
            endpoint.into(),
            api_key.into(),
            temperature,
        ))
    }

    pub(crate) fn with_client(
        client: Arc<HttpClient>,
        provider: String,
        endpoint: String,
        api_key: String,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            client,
            provider,
            endpoint,
            api_key,
            temperature: temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }

    /// Build a backend for `model`, reading its API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the key variable is unset or empty
    pub(crate) fn from_model_config(
        model: &ModelConfig,
        client: Arc<HttpClient>,
    ) -> Result<Self, LlmError> {
        let api_key_env = model.api_key_env();
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Misconfiguration(format!(
                    "API key for model '{}' not found in environment variable '{api_key_env}'. \
                     Set this variable or configure a different api_key_env in [[models]].",
                    model.name
                ))
            })?;

        Ok(Self::with_client(
            client,
            model.provider().to_string(),
            model.endpoint().to_string(),
            api_key,
            model.temperature,
        ))
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage<'_>> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            })
            .collect()
    }

    fn build_request(&self, body: &ChatRequest<'_>) -> reqwest::RequestBuilder {
        let request = self.client.post(&self.endpoint).json(body);
        if self.provider == "azure" {
            request.header("api-key", &self.api_key)
        } else {
            request.bearer_auth(&self.api_key)
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatibleBackend {
    async fn invoke(&self, inv: ModelInvocation) -> Result<ModelCompletion, LlmError> {
        let temperature = inv.temperature.unwrap_or(self.temperature);

        debug!(
            provider = %self.provider,
            model = %inv.model,
            max_tokens = inv.max_output_tokens,
            temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking chat completions backend"
        );

        let body = ChatRequest {
            model: &inv.model,
            messages: Self::convert_messages(&inv.messages),
            max_tokens: inv.max_output_tokens,
            temperature,
            stream: false,
        };

        let response = self
            .client
            .execute(self.build_request(&body), inv.timeout, &self.provider)
            .await?;

        let response_body: ChatResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse {} response: {e}", self.provider))
        })?;

        let mut completion = parse_completion(
            response_body,
            &self.provider,
            &inv.model,
            inv.max_output_tokens,
        )?;
        if completion.model_used.is_empty() {
            completion.model_used.clone_from(&inv.model);
        }

        debug!(
            provider = %self.provider,
            model = %completion.model_used,
            tokens_input = ?completion.tokens_input,
            tokens_output = ?completion.tokens_output,
            "Chat completion received"
        );

        Ok(completion)
    }
}

fn parse_completion(
    response: ChatResponse,
    provider: &str,
    requested_model: &str,
    max_output_tokens: usize,
) -> Result<ModelCompletion, LlmError> {
    let choice = response.choices.into_iter().next().ok_or_else(|| {
        LlmError::Transport(format!("{provider} response missing choices[0]"))
    })?;

    // Code cut off mid-statement is worse than no code at all
    if choice.finish_reason.as_deref() == Some("length") {
        return Err(LlmError::Truncated { max_output_tokens });
    }

    let content = choice.message.content.ok_or_else(|| {
        LlmError::Transport(format!("{provider} response missing content in choices[0]"))
    })?;

    let model_used = response
        .model
        .unwrap_or_else(|| requested_model.to_string());
    let mut completion = ModelCompletion::new(content, provider, model_used);
    if let Some(usage) = response.usage {
        completion.tokens_input = Some(usage.prompt_tokens);
        completion.tokens_output = Some(usage.completion_tokens);
    }
    Ok(completion)
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    fn test_request_body_shape() {
        let inv = ModelInvocation::new("gpt-4o", "write a function", 512, Duration::from_secs(5))
            .with_system("You are a coding assistant");
        let body = ChatRequest {
            model: &inv.model,
            messages: OpenAiCompatibleBackend::convert_messages(&inv.messages),
            max_tokens: inv.max_output_tokens,
            temperature: 0.2,
            stream: false,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "write a function");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_parse_completion_with_usage() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "model": "gpt-4o-2024-08-06",
                "choices": [{"message": {"role": "assistant", "content": "print(1)"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            }"#,
        )
        .unwrap();

        let completion = parse_completion(response, "openai", "gpt-4o", 512).unwrap();
        assert_eq!(completion.text, "print(1)");
        assert_eq!(completion.model_used, "gpt-4o-2024-08-06");
        assert_eq!(completion.tokens_input, Some(12));
        assert_eq!(completion.tokens_output, Some(3));
    }

    #[test]
    fn test_parse_completion_missing_choice_is_transport_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = parse_completion(response, "openai", "m", 512).unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));

        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(parse_completion(response, "openai", "m", 512).is_err());
    }

    #[test]
    fn test_length_finish_reason_is_truncation() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "def f(:\n"}, "finish_reason": "length"}]}"#,
        )
        .unwrap();
        let err = parse_completion(response, "openai", "gpt-4o", 211).unwrap_err();
        assert!(matches!(err, LlmError::Truncated { max_output_tokens: 211 }));
        assert!(err.is_transient());

        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "x = 1"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        assert!(parse_completion(response, "openai", "gpt-4o", 211).is_ok());
    }

    #[test]
    #[serial]
    fn test_missing_api_key_is_misconfiguration() {
        let mut model = ModelConfig::new("gpt-4o", 4000, 1);
        model.api_key_env = Some("CODEFORGE_TEST_MISSING_KEY".to_string());
        // SAFETY: serialized test; no other thread reads this variable
        unsafe { std::env::remove_var("CODEFORGE_TEST_MISSING_KEY") };

        let client = Arc::new(HttpClient::new().unwrap());
        let err = OpenAiCompatibleBackend::from_model_config(&model, client).unwrap_err();
        match err {
            LlmError::Misconfiguration(msg) => {
                assert!(msg.contains("CODEFORGE_TEST_MISSING_KEY"));
                assert!(msg.contains("gpt-4o"));
            }
            other => panic!("Expected Misconfiguration, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_backend_from_config_reads_key() {
        let mut model = ModelConfig::new("gpt-4o", 4000, 1);
        model.api_key_env = Some("CODEFORGE_TEST_PRESENT_KEY".to_string());
        model.endpoint = Some("http://localhost:9/v1/chat/completions".to_string());
        // SAFETY: serialized test; no other thread reads this variable
        unsafe { std::env::set_var("CODEFORGE_TEST_PRESENT_KEY", "secret-value") };

        let client = Arc::new(HttpClient::new().unwrap());
        let backend = OpenAiCompatibleBackend::from_model_config(&model, client).unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:9/v1/chat/completions");
        assert!(!format!("{backend:?}").contains("secret-value"));

        // SAFETY: as above
        unsafe { std::env::remove_var("CODEFORGE_TEST_PRESENT_KEY") };
    }
}
