use std::collections::HashSet;

use codeforge_utils::error::ConfigError;

use super::Config;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values.
    ///
    /// Every model must keep a positive effective limit once the safety buffer
    /// is subtracted, so a budget can always be derived for it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(invalid("models", "at least one model must be configured"));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.name.trim().is_empty() {
                return Err(invalid("models.name", "must not be empty"));
            }
            if !seen.insert(model.name.as_str()) {
                return Err(invalid(
                    "models.name",
                    format!("duplicate model '{}'", model.name),
                ));
            }
            if model.max_tokens == 0 {
                return Err(invalid(
                    "models.max_tokens",
                    format!("model '{}' must have max_tokens greater than 0", model.name),
                ));
            }
            if self.budget.safety_buffer >= model.max_tokens {
                return Err(invalid(
                    "budget.safety_buffer",
                    format!(
                        "{} leaves no usable tokens for model '{}' (max_tokens {})",
                        self.budget.safety_buffer, model.name, model.max_tokens
                    ),
                ));
            }
            if self.budget.safety_buffer + self.budget.output_reserve >= model.max_tokens {
                return Err(invalid(
                    "budget.output_reserve",
                    format!(
                        "{} plus the safety buffer leaves no room for input on model '{}' (max_tokens {})",
                        self.budget.output_reserve, model.name, model.max_tokens
                    ),
                ));
            }
            if model.chars_per_token == Some(0) {
                return Err(invalid(
                    "models.chars_per_token",
                    format!("model '{}' must have chars_per_token greater than 0", model.name),
                ));
            }
            if let Some(temperature) = model.temperature
                && !(0.0..=2.0).contains(&temperature)
            {
                return Err(invalid(
                    "models.temperature",
                    format!("{temperature} is outside 0.0..=2.0"),
                ));
            }
        }

        if self.budget.chars_per_token == 0 {
            return Err(invalid("budget.chars_per_token", "must be greater than 0"));
        }
        if self.budget.output_reserve == 0 {
            return Err(invalid("budget.output_reserve", "must be greater than 0"));
        }
        if self.pipeline.per_chunk_max_attempts == 0 {
            return Err(invalid(
                "pipeline.per_chunk_max_attempts",
                "must be greater than 0",
            ));
        }
        if self.pipeline.per_call_timeout_secs == 0 {
            return Err(invalid("pipeline.per_call_timeout_secs", "must be greater than 0"));
        }
        if self.pipeline.validation_timeout_secs == 0 {
            return Err(invalid(
                "pipeline.validation_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.pipeline.request_deadline_secs == 0 {
            return Err(invalid("pipeline.request_deadline_secs", "must be greater than 0"));
        }
        if self.router.failure_threshold == 0 {
            return Err(invalid("router.failure_threshold", "must be greater than 0"));
        }
        if self.router.unhealthy_backoff_secs.is_empty() {
            return Err(invalid("router.unhealthy_backoff_secs", "must not be empty"));
        }
        if self.router.unhealthy_backoff_secs.contains(&0) {
            return Err(invalid(
                "router.unhealthy_backoff_secs",
                "durations must be greater than 0",
            ));
        }
        for (language, command) in &self.validation.runners {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(invalid(
                    "validation.runners",
                    format!("runner for '{language}' has an empty command"),
                ));
            }
        }

        Ok(())
    }
}
