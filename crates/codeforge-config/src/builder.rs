use std::time::Duration;

use codeforge_utils::error::ConfigError;

use super::{Config, ConfigSource, ModelConfig};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding codeforge without relying on config files.
    ///
    /// # Example
    ///
    /// ```rust
    /// use codeforge_config::{Config, ModelConfig};
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .model(ModelConfig::new("gpt-4o", 4000, 1))
    ///     .safety_buffer(200)
    ///     .max_iterations(3)
    ///     .per_call_timeout(Duration::from_secs(60))
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.models.len(), 1);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration of codeforge.
///
/// Values not set fall back to the built-in defaults. All values set via the
/// builder are attributed to `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    models: Vec<ModelConfig>,
    safety_buffer: Option<usize>,
    chars_per_token: Option<usize>,
    output_reserve: Option<usize>,
    context_lines: Option<usize>,
    context_tokens: Option<usize>,
    allow_forced_splits: Option<bool>,
    max_iterations: Option<u32>,
    per_chunk_max_attempts: Option<u32>,
    per_call_timeout: Option<Duration>,
    validation_timeout: Option<Duration>,
    request_deadline: Option<Duration>,
    failure_threshold: Option<u32>,
    backoff_schedule: Option<Vec<Duration>>,
}

impl ConfigBuilder {
    /// Create a new `ConfigBuilder` with no values set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model. When no model is added, the default model set is used.
    #[must_use]
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.models.push(model);
        self
    }

    #[must_use]
    pub fn safety_buffer(mut self, tokens: usize) -> Self {
        self.safety_buffer = Some(tokens);
        self
    }

    #[must_use]
    pub fn chars_per_token(mut self, chars: usize) -> Self {
        self.chars_per_token = Some(chars);
        self
    }

    /// Tokens kept free in every call for the completion
    #[must_use]
    pub fn output_reserve(mut self, tokens: usize) -> Self {
        self.output_reserve = Some(tokens);
        self
    }

    #[must_use]
    pub fn context_window(mut self, lines: usize, tokens: usize) -> Self {
        self.context_lines = Some(lines);
        self.context_tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn allow_forced_splits(mut self, allow: bool) -> Self {
        self.allow_forced_splits = Some(allow);
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    #[must_use]
    pub fn per_chunk_max_attempts(mut self, attempts: u32) -> Self {
        self.per_chunk_max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn per_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn backoff_schedule(mut self, schedule: Vec<Duration>) -> Self {
        self.backoff_schedule = Some(schedule);
        self
    }

    /// Build and validate the configuration.
    ///
    /// Durations are stored with whole-second precision; sub-second values round up.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let attribution = &mut config.source_attribution;
        let mut set = |key: &str| {
            attribution.insert(key.to_string(), ConfigSource::Programmatic);
        };

        if !self.models.is_empty() {
            config.models = self.models;
            set("models");
        }
        if let Some(v) = self.safety_buffer {
            config.budget.safety_buffer = v;
            set("budget.safety_buffer");
        }
        if let Some(v) = self.chars_per_token {
            config.budget.chars_per_token = v;
            set("budget.chars_per_token");
        }
        if let Some(v) = self.output_reserve {
            config.budget.output_reserve = v;
            set("budget.output_reserve");
        }
        if let Some(v) = self.context_lines {
            config.chunking.context_lines = v;
            set("chunking.context_lines");
        }
        if let Some(v) = self.context_tokens {
            config.chunking.context_tokens = v;
            set("chunking.context_tokens");
        }
        if let Some(v) = self.allow_forced_splits {
            config.chunking.allow_forced_splits = v;
            set("chunking.allow_forced_splits");
        }
        if let Some(v) = self.max_iterations {
            config.pipeline.max_iterations = v;
            set("pipeline.max_iterations");
        }
        if let Some(v) = self.per_chunk_max_attempts {
            config.pipeline.per_chunk_max_attempts = v;
            set("pipeline.per_chunk_max_attempts");
        }
        if let Some(v) = self.per_call_timeout {
            config.pipeline.per_call_timeout_secs = ceil_secs(v);
            set("pipeline.per_call_timeout_secs");
        }
        if let Some(v) = self.validation_timeout {
            config.pipeline.validation_timeout_secs = ceil_secs(v);
            set("pipeline.validation_timeout_secs");
        }
        if let Some(v) = self.request_deadline {
            config.pipeline.request_deadline_secs = ceil_secs(v);
            set("pipeline.request_deadline_secs");
        }
        if let Some(v) = self.failure_threshold {
            config.router.failure_threshold = v;
            set("router.failure_threshold");
        }
        if let Some(v) = self.backoff_schedule {
            config.router.unhealthy_backoff_secs = v.into_iter().map(ceil_secs).collect();
            set("router.unhealthy_backoff_secs");
        }

        config.validate()?;
        Ok(config)
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default_config() {
        let built = Config::builder().build().unwrap();
        let default = Config::default();
        assert_eq!(built.models, default.models);
        assert_eq!(built.pipeline, default.pipeline);
        assert!(built.source_attribution.is_empty());
    }

    #[test]
    fn test_builder_attributes_programmatic_values() {
        let config = Config::builder()
            .model(ModelConfig::new("a", 2000, 1))
            .max_iterations(1)
            .output_reserve(512)
            .request_deadline(Duration::from_millis(1500))
            .build()
            .unwrap();

        assert_eq!(config.budget.output_reserve, 512);
        assert_eq!(
            config.source_attribution.get("budget.output_reserve"),
            Some(&ConfigSource::Programmatic)
        );

        assert_eq!(config.pipeline.max_iterations, 1);
        assert_eq!(config.pipeline.request_deadline_secs, 2);
        assert_eq!(
            config.source_attribution.get("pipeline.max_iterations"),
            Some(&ConfigSource::Programmatic)
        );
        assert_eq!(
            config.source_attribution.get("models"),
            Some(&ConfigSource::Programmatic)
        );
    }

    #[test]
    fn test_builder_validates() {
        let result = Config::builder()
            .model(ModelConfig::new("a", 100, 1))
            .safety_buffer(100)
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
