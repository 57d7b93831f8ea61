use crate::config::settings::{CostTrackingMode, ModelConfig};
use crate::model::cache_control;
use crate::model::client::{
    CompletionProvider, Message, ModelError, QueryResult, ResultExtra, Usage, WireMessage,
};
use crate::model::openai::OpenAiProvider;
use crate::model::registry::ModelRegistry;
use crate::model::retry;
use crate::model::stats::UsageStats;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::error;

/// Retrying, cost-accounted client for a completion provider.
///
/// Each successful query updates the instance counters and the shared
/// [`UsageStats`] accumulator. The instance itself is safe to share across
/// threads; queries take `&self`.
pub struct ModelClient {
    config: ModelConfig,
    provider: Box<dyn CompletionProvider>,
    registry: ModelRegistry,
    local: UsageStats,
    shared: Arc<UsageStats>,
}

impl ModelClient {
    /// Client with a private stats accumulator.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        Self::with_stats(config, Arc::new(UsageStats::new()))
    }

    /// Client contributing to a caller-owned shared accumulator.
    pub fn with_stats(config: ModelConfig, stats: Arc<UsageStats>) -> Result<Self, ModelError> {
        let provider = Box::new(OpenAiProvider::from_config(&config));
        Self::with_provider(config, provider, stats)
    }

    /// Client with an explicit provider implementation (tests, gateways).
    ///
    /// If the configured model registry file exists it is loaded here, so
    /// otherwise-unrecognized model names can be cost-tracked.
    pub fn with_provider(
        config: ModelConfig,
        provider: Box<dyn CompletionProvider>,
        shared: Arc<UsageStats>,
    ) -> Result<Self, ModelError> {
        let mut registry = ModelRegistry::builtin();
        if let Some(path) = &config.model_registry_path {
            if path.is_file() {
                registry.load_file(path)?;
            }
        }
        Ok(Self {
            config,
            provider,
            registry,
            local: UsageStats::new(),
            shared,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Cumulative cost of this instance's successful queries.
    pub fn cost(&self) -> f64 {
        self.local.total_cost()
    }

    /// Number of successful queries made by this instance.
    pub fn n_calls(&self) -> u64 {
        self.local.n_calls()
    }

    pub fn shared_stats(&self) -> Arc<UsageStats> {
        Arc::clone(&self.shared)
    }

    /// Send a message sequence to the model and normalize the response.
    ///
    /// `overrides` are provider call parameters merged over the configured
    /// `model_kwargs` (overrides win on key collision). Transient failures
    /// are retried per the configured schedule; cost calculation failures
    /// are fatal unless cost tracking is `IgnoreErrors`.
    pub async fn query(
        &self,
        messages: &[Message],
        overrides: Map<String, Value>,
    ) -> Result<QueryResult, ModelError> {
        let mut wire: Vec<WireMessage> = messages.iter().map(WireMessage::from).collect();
        if let Some(mode) = self.config.cache_control {
            wire = cache_control::apply(mode, wire);
        }

        let mut params = self.config.model_kwargs.clone();
        for (key, value) in overrides {
            params.insert(key, value);
        }

        let provider: &dyn CompletionProvider = self.provider.as_ref();
        let model = self.config.model_name.as_str();
        let wire_ref: &[WireMessage] = &wire;
        let params_ref = &params;
        let response = retry::run(&self.config.retry, move |_attempt| {
            provider.complete(model, wire_ref, params_ref)
        })
        .await?;

        let usage = response.usage.clone().unwrap_or_else(Usage::default);
        let cost = match self.registry.completion_cost(model, &usage) {
            Ok(cost) => cost,
            Err(err) => {
                if self.config.cost_tracking == CostTrackingMode::IgnoreErrors {
                    0.0
                } else {
                    error!(
                        model,
                        error = %err,
                        "cost tracking failed; set MODEL_COST_TRACKING=ignore_errors or use \
                         cost_tracking: ignore_errors to continue without cost data"
                    );
                    return Err(err);
                }
            }
        };
        self.local.add(cost);
        self.shared.add(cost);

        let raw = serde_json::to_value(&response)
            .map_err(|e| ModelError::InvalidResponse(format!("failed to encode response: {e}")))?;
        let first = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("response contained no choices".into()))?;

        Ok(QueryResult {
            content: first.message.content.unwrap_or_default(),
            tool_calls: first.message.tool_calls.filter(|calls| !calls.is_empty()),
            extra: ResultExtra { response: raw },
        })
    }

    /// Configuration plus usage counters, for surrounding prompt templating.
    pub fn get_template_vars(&self) -> Map<String, Value> {
        let mut vars = match serde_json::to_value(&self.config) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        vars.insert("n_model_calls".to_string(), Value::from(self.local.n_calls()));
        vars.insert("model_cost".to_string(), Value::from(self.local.total_cost()));
        vars
    }
}
