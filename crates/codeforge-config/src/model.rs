use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use codeforge_utils::Language;

/// Default endpoint for the OpenAI-compatible inference API used by the default models
pub const DEFAULT_ENDPOINT: &str = "https://models.inference.ai.azure.com/chat/completions";

/// Default environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "GITHUB_TOKEN";

/// Source of a configuration value for attribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Cli,
    ConfigFile(PathBuf),
    Programmatic,
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::ConfigFile(path) => write!(f, "config ({})", path.display()),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Defaults => write!(f, "default"),
        }
    }
}

/// One model backend the router may select.
///
/// ```toml
/// [[models]]
/// name = "gpt-4o"
/// max_tokens = 4000
/// priority = 1
/// endpoint = "https://models.inference.ai.azure.com/chat/completions"
/// api_key_env = "GITHUB_TOKEN"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Model identifier sent to the provider
    pub name: String,
    /// Hard token limit for one call (prompt plus completion)
    pub max_tokens: usize,
    /// Priority rank; lower values are preferred
    pub priority: u32,
    /// Provider kind (default: `openai`, any OpenAI-compatible chat completions API)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Chat completions endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Overrides `budget.chars_per_token` for this model's tokenizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars_per_token: Option<usize>,
}

impl ModelConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, max_tokens: usize, priority: u32) -> Self {
        Self {
            name: name.into(),
            max_tokens,
            priority,
            provider: None,
            endpoint: None,
            api_key_env: None,
            temperature: None,
            chars_per_token: None,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        self.provider.as_deref().unwrap_or("openai")
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    #[must_use]
    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }
}

/// Models shipped as defaults when no `[[models]]` are configured
#[must_use]
pub fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("Codestral-2501", 4000, 1),
        ModelConfig::new("gpt-4o", 4000, 1),
        ModelConfig::new("gpt-4.1", 4000, 2),
        ModelConfig::new("cohere-command-a", 4000, 3),
    ]
}

/// Token estimation settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Tokens reserved below every model's hard limit
    pub safety_buffer: usize,
    /// Bytes of text assumed per token when no tokenizer is available;
    /// smaller is more conservative
    pub chars_per_token: usize,
    /// Tokens kept free in every call for the model's answer
    pub output_reserve: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            safety_buffer: 200,
            chars_per_token: 4,
            output_reserve: 1024,
        }
    }
}

/// Chunk planning settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Trailing window carried into the next chunk: last N lines
    pub context_lines: usize,
    /// Trailing window carried into the next chunk: at most M tokens
    pub context_tokens: usize,
    /// Split units with no semantic boundary at arbitrary char boundaries
    pub allow_forced_splits: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            context_lines: 3,
            context_tokens: 100,
            allow_forced_splits: true,
        }
    }
}

/// Generate/validate/fix loop settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on fix iterations
    pub max_iterations: u32,
    /// Model attempts per chunk before giving up on it
    pub per_chunk_max_attempts: u32,
    pub per_call_timeout_secs: u64,
    pub validation_timeout_secs: u64,
    /// Overall deadline for one request
    pub request_deadline_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            per_chunk_max_attempts: 3,
            per_call_timeout_secs: 120,
            validation_timeout_secs: 30,
            request_deadline_secs: 600,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub const fn per_call_timeout(&self) -> Duration {
        Duration::from_secs(self.per_call_timeout_secs)
    }

    #[must_use]
    pub const fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }

    #[must_use]
    pub const fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

/// Model health tracking settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Consecutive transient failures before a model is marked unhealthy
    pub failure_threshold: u32,
    /// Re-eligibility windows; the n-th trip past the threshold uses entry n (clamped)
    pub unhealthy_backoff_secs: Vec<u64>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            unhealthy_backoff_secs: vec![30, 60, 120, 300],
        }
    }
}

impl RouterConfig {
    #[must_use]
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.unhealthy_backoff_secs
            .iter()
            .map(|secs| Duration::from_secs(*secs))
            .collect()
    }
}

/// Validation settings
///
/// ```toml
/// [validation]
/// execute = true
///
/// [validation.runners]
/// python = ["python3"]
/// javascript = ["node"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Run generated code with the configured runner after syntax checks pass
    pub execute: bool,
    /// Interpreter command per language; the code file path is appended
    pub runners: BTreeMap<String, Vec<String>>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let mut runners = BTreeMap::new();
        runners.insert("python".to_string(), vec!["python3".to_string()]);
        runners.insert("javascript".to_string(), vec!["node".to_string()]);
        Self {
            execute: false,
            runners,
        }
    }
}

impl ValidationConfig {
    /// Runner command for a language, if one is configured
    #[must_use]
    pub fn runner_for(&self, language: &Language) -> Option<&[String]> {
        self.runners
            .get(language.as_str())
            .map(Vec::as_slice)
            .filter(|cmd| !cmd.is_empty())
    }
}

/// Configuration for codeforge operations.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > config file > built-in defaults.
///
/// Use [`Config::discover()`] for CLI-like behavior or [`Config::builder()`]
/// for deterministic programmatic construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub models: Vec<ModelConfig>,
    pub budget: BudgetConfig,
    pub chunking: ChunkingConfig,
    pub pipeline: PipelineConfig,
    pub router: RouterConfig,
    pub validation: ValidationConfig,
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: default_models(),
            budget: BudgetConfig::default(),
            chunking: ChunkingConfig::default(),
            pipeline: PipelineConfig::default(),
            router: RouterConfig::default(),
            validation: ValidationConfig::default(),
            source_attribution: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a configured model by name
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Smallest `max_tokens` across all configured models
    #[must_use]
    pub fn smallest_max_tokens(&self) -> Option<usize> {
        self.models.iter().map(|m| m.max_tokens).min()
    }

    /// Small, fast configuration for tests: two models, short timeouts
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn minimal_for_testing() -> Self {
        Self {
            models: vec![
                ModelConfig::new("alpha", 1000, 1),
                ModelConfig::new("beta", 1000, 2),
            ],
            budget: BudgetConfig {
                safety_buffer: 100,
                chars_per_token: 4,
                output_reserve: 256,
            },
            chunking: ChunkingConfig::default(),
            pipeline: PipelineConfig {
                max_iterations: 2,
                per_chunk_max_attempts: 2,
                per_call_timeout_secs: 5,
                validation_timeout_secs: 5,
                request_deadline_secs: 60,
            },
            router: RouterConfig {
                failure_threshold: 2,
                unhealthy_backoff_secs: vec![10, 20],
            },
            validation: ValidationConfig::default(),
            source_attribution: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_match_shipped_set() {
        let config = Config::default();
        let names: Vec<&str> = config.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Codestral-2501", "gpt-4o", "gpt-4.1", "cohere-command-a"]
        );
        assert_eq!(config.smallest_max_tokens(), Some(4000));
    }

    #[test]
    fn test_model_defaults_fill_provider_fields() {
        let model = ModelConfig::new("m", 10, 1);
        assert_eq!(model.provider(), "openai");
        assert_eq!(model.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(model.api_key_env(), DEFAULT_API_KEY_ENV);
    }

    #[test]
    fn test_runner_lookup_ignores_empty_commands() {
        let mut validation = ValidationConfig::default();
        validation.runners.insert("rust".to_string(), Vec::new());

        assert_eq!(
            validation.runner_for(&Language::Python),
            Some(&["python3".to_string()][..])
        );
        assert_eq!(validation.runner_for(&Language::Rust), None);
        assert_eq!(validation.runner_for(&Language::Css), None);
    }

    #[test]
    fn test_backoff_schedule_durations() {
        let router = RouterConfig::default();
        assert_eq!(
            router.backoff_schedule(),
            vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(120),
                Duration::from_secs(300)
            ]
        );
    }
}
