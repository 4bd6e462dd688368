//! Backend registry keyed by configured model name

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use codeforge_config::{Config, ModelConfig};
use codeforge_utils::LlmError;

use crate::http_client::HttpClient;
use crate::openai_backend::OpenAiCompatibleBackend;
use crate::types::{ModelBackend, ModelCompletion, ModelInvocation};

/// Providers that speak the OpenAI chat completions format
const OPENAI_COMPATIBLE_PROVIDERS: &[&str] = &["openai", "github", "azure"];

enum Slot {
    Ready(Arc<dyn ModelBackend>),
    /// Construction failed; every call reports this error
    Broken(LlmError),
}

/// Maps model names to the backend serving them.
///
/// The registry is itself a [`ModelBackend`] that dispatches on
/// `ModelInvocation::model`, so the orchestrator holds a single backend.
#[derive(Default)]
pub struct BackendRegistry {
    slots: HashMap<String, Slot>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.slots.keys().collect();
        names.sort();
        f.debug_struct("BackendRegistry")
            .field("models", &names)
            .finish()
    }
}

impl BackendRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one backend per configured model.
    ///
    /// A model whose backend cannot be built (unknown provider, missing API key)
    /// stays registered and fails every call with the construction error, which
    /// the router treats as fatal.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the shared HTTP client cannot be built
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let client = Arc::new(HttpClient::new()?);
        let mut registry = Self::new();

        for model in &config.models {
            match construct_backend(model, Arc::clone(&client)) {
                Ok(backend) => registry.register(model.name.clone(), backend),
                Err(err) => {
                    warn!(model = %model.name, error = %err, "Model backend unavailable");
                    registry
                        .slots
                        .insert(model.name.clone(), Slot::Broken(err));
                }
            }
        }

        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn ModelBackend>) {
        self.slots.insert(name.into(), Slot::Ready(backend));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ModelBackend>> {
        match self.slots.get(name)? {
            Slot::Ready(backend) => Some(Arc::clone(backend)),
            Slot::Broken(_) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Select the backend implementation for a model's provider
fn construct_backend(
    model: &ModelConfig,
    client: Arc<HttpClient>,
) -> Result<Arc<dyn ModelBackend>, LlmError> {
    let provider = model.provider();
    if OPENAI_COMPATIBLE_PROVIDERS.contains(&provider) {
        let backend = OpenAiCompatibleBackend::from_model_config(model, client)?;
        debug!(model = %model.name, provider, endpoint = backend.endpoint(), "Registered backend");
        return Ok(Arc::new(backend));
    }

    Err(LlmError::Unsupported(format!(
        "Provider '{provider}' for model '{}' is not supported. \
         Supported providers: {}",
        model.name,
        OPENAI_COMPATIBLE_PROVIDERS.join(", ")
    )))
}

#[async_trait]
impl ModelBackend for BackendRegistry {
    async fn invoke(&self, invocation: ModelInvocation) -> Result<ModelCompletion, LlmError> {
        match self.slots.get(&invocation.model) {
            Some(Slot::Ready(backend)) => backend.invoke(invocation).await,
            Some(Slot::Broken(err)) => Err(err.clone()),
            None => Err(LlmError::Misconfiguration(format!(
                "No backend registered for model '{}'",
                invocation.model
            ))),
        }
    }
}
