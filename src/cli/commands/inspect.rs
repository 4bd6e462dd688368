//! Models and config command implementations
//!
//! Handles `codeforge models` and `codeforge config`; both read the
//! effective configuration and never call a model.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use super::common::print_json;
use crate::{CodeforgeError, Config, TokenBudgetEstimator};

/// One configured model as listed by `codeforge models`
#[derive(Debug, Serialize)]
struct ModelRow {
    name: String,
    priority: u32,
    max_tokens: usize,
    effective_limit: usize,
    provider: String,
    endpoint: String,
    api_key_env: String,
    api_key_set: bool,
}

fn model_rows(config: &Config) -> Result<Vec<ModelRow>, CodeforgeError> {
    let estimator = TokenBudgetEstimator::from_config(config)?;
    let mut rows: Vec<ModelRow> = config
        .models
        .iter()
        .map(|model| ModelRow {
            name: model.name.clone(),
            priority: model.priority,
            max_tokens: model.max_tokens,
            effective_limit: estimator.budget_for(&model.name).effective_limit(),
            provider: model.provider().to_string(),
            endpoint: model.endpoint().to_string(),
            api_key_env: model.api_key_env().to_string(),
            api_key_set: std::env::var(model.api_key_env())
                .is_ok_and(|key| !key.trim().is_empty()),
        })
        .collect();
    rows.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
    Ok(rows)
}

/// Execute the models command
pub fn execute_models_command(config: &Config, json: bool) -> Result<()> {
    let rows = model_rows(config)?;
    if json {
        return print_json(&rows);
    }

    println!(
        "{:<24} {:>8} {:>10} {:>10}  {}",
        "MODEL", "PRIORITY", "MAX", "EFFECTIVE", "API KEY"
    );
    for row in &rows {
        let key = if row.api_key_set {
            format!("{} (set)", row.api_key_env)
        } else {
            format!("{} (missing)", row.api_key_env)
        };
        println!(
            "{:<24} {:>8} {:>10} {:>10}  {key}",
            row.name, row.priority, row.max_tokens, row.effective_limit
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConfigEntry {
    value: String,
    source: String,
}

/// Execute the config command
pub fn execute_config_command(config: &Config, json: bool) -> Result<()> {
    let effective = config.effective_config();
    if json {
        let entries: BTreeMap<String, ConfigEntry> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, ConfigEntry { value, source }))
            .collect();
        return print_json(&entries);
    }

    println!("Effective configuration:");
    for (key, (value, source)) in &effective {
        println!("  {key} = {value}  [{source}]");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeforge_config::ModelConfig;

    #[test]
    fn test_model_rows_sorted_by_priority() {
        let mut config = Config::minimal_for_testing();
        config.models.reverse();
        config.models.push(ModelConfig::new("gamma", 2000, 1));

        let rows = model_rows(&config).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "gamma", "beta"]);
        assert_eq!(rows[0].effective_limit, 900);
        assert_eq!(rows[1].effective_limit, 1900);
    }
}
