use std::collections::BTreeMap;

use super::{Config, ConfigSource};

fn stable_source_label(source: Option<&ConfigSource>) -> &'static str {
    match source {
        Some(ConfigSource::Cli) => "cli",
        Some(ConfigSource::ConfigFile(_)) => "config",
        Some(ConfigSource::Programmatic) => "programmatic",
        Some(ConfigSource::Defaults) | None => "default",
    }
}

impl Config {
    /// Get effective configuration as `key -> (value, source)` pairs, sorted by key
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: String| {
            let source = stable_source_label(self.source_attribution.get(key));
            config.insert(key.to_string(), (value, source.to_string()));
        };

        let models = self
            .models
            .iter()
            .map(|m| format!("{}(p{}, {})", m.name, m.priority, m.max_tokens))
            .collect::<Vec<_>>()
            .join(", ");
        add("models", models);

        add("budget.safety_buffer", self.budget.safety_buffer.to_string());
        add("budget.chars_per_token", self.budget.chars_per_token.to_string());
        add("budget.output_reserve", self.budget.output_reserve.to_string());
        add("chunking.context_lines", self.chunking.context_lines.to_string());
        add("chunking.context_tokens", self.chunking.context_tokens.to_string());
        add(
            "chunking.allow_forced_splits",
            self.chunking.allow_forced_splits.to_string(),
        );
        add(
            "pipeline.max_iterations",
            self.pipeline.max_iterations.to_string(),
        );
        add(
            "pipeline.per_chunk_max_attempts",
            self.pipeline.per_chunk_max_attempts.to_string(),
        );
        add(
            "pipeline.per_call_timeout_secs",
            self.pipeline.per_call_timeout_secs.to_string(),
        );
        add(
            "pipeline.validation_timeout_secs",
            self.pipeline.validation_timeout_secs.to_string(),
        );
        add(
            "pipeline.request_deadline_secs",
            self.pipeline.request_deadline_secs.to_string(),
        );
        add(
            "router.failure_threshold",
            self.router.failure_threshold.to_string(),
        );
        add(
            "router.unhealthy_backoff_secs",
            format!("{:?}", self.router.unhealthy_backoff_secs),
        );
        add("validation.execute", self.validation.execute.to_string());

        let runners = self
            .validation
            .runners
            .iter()
            .map(|(lang, cmd)| format!("{lang}={}", cmd.join(" ")))
            .collect::<Vec<_>>()
            .join(", ");
        add("validation.runners", runners);

        config
    }
}
