use crate::model::client::{ModelError, Usage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Per-token pricing and capability metadata for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    #[serde(default)]
    pub input_cost_per_token: f64,
    #[serde(default)]
    pub output_cost_per_token: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_input_tokens: Option<u64>,
}

/// Maps model names to pricing metadata for cost calculation.
///
/// Starts from a small builtin table; entries for other models are merged in
/// from the JSON registry file at client construction.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, ModelPricing>,
}

impl ModelRegistry {
    /// Registry with builtin pricing for a handful of common models.
    pub fn builtin() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "gpt-4o".to_string(),
            ModelPricing {
                input_cost_per_token: 2.5e-6,
                output_cost_per_token: 10e-6,
                max_input_tokens: Some(128_000),
            },
        );
        models.insert(
            "gpt-4o-mini".to_string(),
            ModelPricing {
                input_cost_per_token: 0.15e-6,
                output_cost_per_token: 0.6e-6,
                max_input_tokens: Some(128_000),
            },
        );
        models.insert(
            "gpt-4.1".to_string(),
            ModelPricing {
                input_cost_per_token: 2e-6,
                output_cost_per_token: 8e-6,
                max_input_tokens: Some(1_047_576),
            },
        );
        models.insert(
            "claude-sonnet-4-20250514".to_string(),
            ModelPricing {
                input_cost_per_token: 3e-6,
                output_cost_per_token: 15e-6,
                max_input_tokens: Some(200_000),
            },
        );
        models.insert(
            "claude-opus-4-20250514".to_string(),
            ModelPricing {
                input_cost_per_token: 15e-6,
                output_cost_per_token: 75e-6,
                max_input_tokens: Some(200_000),
            },
        );
        Self { models }
    }

    /// Registry with no entries at all (tests, fully file-driven setups).
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Merge entries into the registry; collisions overwrite builtins.
    pub fn register(&mut self, entries: HashMap<String, ModelPricing>) {
        self.models.extend(entries);
    }

    /// Load a JSON registry file (object mapping model name -> metadata) and
    /// merge its entries. Returns the number of entries registered.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ModelError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ModelError::Registry(format!("failed to read {}: {e}", path.display()))
        })?;
        let entries: HashMap<String, ModelPricing> =
            serde_json::from_str(&contents).map_err(|e| {
                ModelError::Registry(format!("failed to parse {}: {e}", path.display()))
            })?;
        let count = entries.len();
        self.register(entries);
        Ok(count)
    }

    pub fn pricing(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    /// Monetary cost of one completion, from the provider-reported usage.
    ///
    /// An unknown model or a cost <= 0.0 is an error; whether that is fatal
    /// is decided by the caller's cost tracking mode.
    pub fn completion_cost(&self, model: &str, usage: &Usage) -> Result<f64, ModelError> {
        let pricing = self.pricing(model).ok_or_else(|| ModelError::CostCalculation {
            model: model.to_string(),
            reason: "model is not in the registry; register it via MODEL_REGISTRY_PATH"
                .to_string(),
        })?;

        let cost = usage.prompt_tokens as f64 * pricing.input_cost_per_token
            + usage.completion_tokens as f64 * pricing.output_cost_per_token;
        if cost <= 0.0 {
            return Err(ModelError::CostCalculation {
                model: model.to_string(),
                reason: format!("cost must be > 0.0, got {cost}"),
            });
        }
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn usage(prompt: u64, completion: u64) -> Usage {
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            ..Usage::default()
        }
    }

    #[test]
    fn test_builtin_cost() {
        let registry = ModelRegistry::builtin();
        let cost = registry.completion_cost("gpt-4o", &usage(1000, 100)).unwrap();
        assert!((cost - 0.0035).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model_is_an_error() {
        let registry = ModelRegistry::builtin();
        let err = registry
            .completion_cost("mystery-model", &usage(10, 10))
            .unwrap_err();
        assert!(matches!(err, ModelError::CostCalculation { .. }));
        assert!(err.to_string().contains("mystery-model"));
    }

    #[test]
    fn test_zero_cost_is_an_error() {
        let registry = ModelRegistry::builtin();
        let err = registry.completion_cost("gpt-4o", &usage(0, 0)).unwrap_err();
        assert!(err.to_string().contains("must be > 0.0"));
    }

    #[test]
    fn test_load_file_merges_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "local-llama": {{"input_cost_per_token": 1e-7, "output_cost_per_token": 2e-7}},
                "gpt-4o": {{"input_cost_per_token": 1e-6, "output_cost_per_token": 1e-6}}
            }}"#
        )
        .unwrap();

        let mut registry = ModelRegistry::builtin();
        let count = registry.load_file(file.path()).unwrap();
        assert_eq!(count, 2);

        let cost = registry
            .completion_cost("local-llama", &usage(100, 50))
            .unwrap();
        assert!((cost - 2e-5).abs() < 1e-15);

        // File entry overrides the builtin.
        assert_eq!(
            registry.pricing("gpt-4o").unwrap().input_cost_per_token,
            1e-6
        );
    }

    #[test]
    fn test_load_file_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let mut registry = ModelRegistry::empty();
        let err = registry.load_file(file.path()).unwrap_err();
        assert!(matches!(err, ModelError::Registry(_)));
    }
}
