use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use codeforge_utils::error::{CodeforgeError, ConfigError};

use super::{
    BudgetConfig, ChunkingConfig, CliArgs, Config, ConfigSource, ModelConfig, PipelineConfig,
    RouterConfig, ValidationConfig,
};

/// File names probed in each directory during discovery, in order
pub const CONFIG_FILE_NAMES: &[&str] = &["codeforge.toml", ".codeforge/config.toml"];

/// TOML configuration file structure
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    models: Option<Vec<ModelConfig>>,
    budget: Option<BudgetConfig>,
    chunking: Option<ChunkingConfig>,
    pipeline: Option<PipelineConfig>,
    router: Option<RouterConfig>,
    validation: Option<ValidationConfig>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, CodeforgeError> {
        let start_dir = std::env::current_dir()?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, CodeforgeError> {
        let mut config = Config::default();
        let mut source_attribution = HashMap::new();
        for key in Self::attributable_keys() {
            source_attribution.insert(key.to_string(), ConfigSource::Defaults);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            debug!(path = %path.display(), "Loading configuration file");
            let (file_config, present_keys) = Self::load_config_file(path)?;
            let source = ConfigSource::ConfigFile(path.clone());

            if let Some(models) = file_config.models {
                config.models = models;
            }
            if let Some(budget) = file_config.budget {
                config.budget = budget;
            }
            if let Some(chunking) = file_config.chunking {
                config.chunking = chunking;
            }
            if let Some(pipeline) = file_config.pipeline {
                config.pipeline = pipeline;
            }
            if let Some(router) = file_config.router {
                config.router = router;
            }
            if let Some(validation) = file_config.validation {
                config.validation = validation;
            }

            for key in present_keys {
                source_attribution.insert(key, source.clone());
            }
        }

        Self::apply_cli_overrides(&mut config, cli_args, &mut source_attribution);
        config.source_attribution = source_attribution;

        config.validate()?;
        Ok(config)
    }

    fn apply_cli_overrides(
        config: &mut Config,
        cli_args: &CliArgs,
        attribution: &mut HashMap<String, ConfigSource>,
    ) {
        if let Some(value) = cli_args.safety_buffer {
            config.budget.safety_buffer = value;
            attribution.insert("budget.safety_buffer".to_string(), ConfigSource::Cli);
        }
        if let Some(value) = cli_args.max_iterations {
            config.pipeline.max_iterations = value;
            attribution.insert("pipeline.max_iterations".to_string(), ConfigSource::Cli);
        }
        if let Some(value) = cli_args.per_chunk_max_attempts {
            config.pipeline.per_chunk_max_attempts = value;
            attribution.insert(
                "pipeline.per_chunk_max_attempts".to_string(),
                ConfigSource::Cli,
            );
        }
        if let Some(value) = cli_args.per_call_timeout_secs {
            config.pipeline.per_call_timeout_secs = value;
            attribution.insert(
                "pipeline.per_call_timeout_secs".to_string(),
                ConfigSource::Cli,
            );
        }
        if let Some(value) = cli_args.request_deadline_secs {
            config.pipeline.request_deadline_secs = value;
            attribution.insert(
                "pipeline.request_deadline_secs".to_string(),
                ConfigSource::Cli,
            );
        }
        if let Some(value) = cli_args.execute_validation {
            config.validation.execute = value;
            attribution.insert("validation.execute".to_string(), ConfigSource::Cli);
        }
    }

    /// Search upward from `start_dir` for a configuration file.
    ///
    /// Stops at the filesystem root or at the first repository root marker.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = Some(start_dir);

        while let Some(dir) = current_dir {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }

            current_dir = dir.parent();
        }

        None
    }

    /// Load configuration from a TOML file, returning the dotted keys it sets
    fn load_config_file(path: &Path) -> Result<(TomlConfig, Vec<String>), CodeforgeError> {
        let content = std::fs::read_to_string(path)?;

        let table: toml::Table = toml::from_str(&content).map_err(|e| {
            ConfigError::InvalidFile(format!("{}: {}", path.display(), e.message()))
        })?;

        let mut present = Vec::new();
        for (section, value) in &table {
            match value {
                toml::Value::Table(inner) => {
                    for key in inner.keys() {
                        present.push(format!("{section}.{key}"));
                    }
                }
                _ => present.push(section.clone()),
            }
        }

        let config: TomlConfig = toml::from_str(&content).map_err(|e| {
            ConfigError::InvalidFile(format!("{}: {}", path.display(), e.message()))
        })?;

        Ok((config, present))
    }

    pub(crate) fn attributable_keys() -> &'static [&'static str] {
        &[
            "models",
            "budget.safety_buffer",
            "budget.chars_per_token",
            "budget.output_reserve",
            "chunking.context_lines",
            "chunking.context_tokens",
            "chunking.allow_forced_splits",
            "pipeline.max_iterations",
            "pipeline.per_chunk_max_attempts",
            "pipeline.per_call_timeout_secs",
            "pipeline.validation_timeout_secs",
            "pipeline.request_deadline_secs",
            "router.failure_threshold",
            "router.unhealthy_backoff_secs",
            "validation.execute",
            "validation.runners",
        ]
    }
}
