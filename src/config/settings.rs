use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a JSON file of extra model pricing entries.
pub const MODEL_REGISTRY_PATH_ENV: &str = "MODEL_REGISTRY_PATH";
/// Environment variable selecting the cost tracking mode (`default` or `ignore_errors`).
pub const COST_TRACKING_ENV: &str = "MODEL_COST_TRACKING";
/// Environment variable overriding the retry attempt ceiling.
pub const RETRY_MAX_ATTEMPTS_ENV: &str = "MODEL_RETRY_MAX_ATTEMPTS";
/// Environment variable overriding the completion API base URL.
pub const API_BASE_URL_ENV: &str = "MODEL_API_BASE_URL";

const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_RETRY_INITIAL_WAIT: Duration = Duration::from_secs(4);
const DEFAULT_RETRY_MAX_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Cache control annotation strategy for providers that support prompt caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheControlMode {
    /// Mark the last non-tool message with an ephemeral cache point.
    DefaultEnd,
}

/// How cost calculation failures are handled after a successful completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTrackingMode {
    /// A cost that cannot be computed (or is <= 0) fails the query.
    #[default]
    Default,
    /// Record a cost of 0.0 and continue.
    IgnoreErrors,
}

impl CostTrackingMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "default" => Ok(Self::Default),
            "ignore_errors" => Ok(Self::IgnoreErrors),
            other => Err(ConfigError::InvalidValue {
                var: COST_TRACKING_ENV.to_string(),
                message: format!("expected 'default' or 'ignore_errors', got '{other}'"),
            }),
        }
    }
}

/// Backoff schedule for the model query retry loop.
///
/// Waits grow as `initial_wait * 2^(attempt - 1)`, clamped to `max_wait`.
#[derive(Debug, Clone, Serialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(skip)]
    pub initial_wait: Duration,
    #[serde(skip)]
    pub max_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_wait: DEFAULT_RETRY_INITIAL_WAIT,
            max_wait: DEFAULT_RETRY_MAX_WAIT,
        }
    }
}

impl RetryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(RETRY_MAX_ATTEMPTS_ENV) {
            config.max_attempts =
                raw.parse::<u32>()
                    .map_err(|_| ConfigError::InvalidValue {
                        var: RETRY_MAX_ATTEMPTS_ENV.to_string(),
                        message: format!("expected a positive integer, got '{raw}'"),
                    })?;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                var: RETRY_MAX_ATTEMPTS_ENV.to_string(),
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Immutable configuration for a [`crate::model::ModelClient`].
///
/// Environment defaults are read once in [`ModelConfig::new`]; later changes to
/// the environment do not affect an existing config.
#[derive(Debug, Clone, Serialize)]
pub struct ModelConfig {
    pub model_name: String,
    /// Provider call parameters sent with every request (temperature, max_tokens, ...).
    pub model_kwargs: Map<String, Value>,
    pub cache_control: Option<CacheControlMode>,
    pub cost_tracking: CostTrackingMode,
    /// JSON file of pricing entries registered at client construction, if it exists.
    pub model_registry_path: Option<PathBuf>,
    /// Completion API base URL; `None` uses the provider default.
    pub api_base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub retry: RetryConfig,
}

impl ModelConfig {
    /// Create a configuration for `model_name`, seeding defaults from the
    /// environment (`MODEL_REGISTRY_PATH`, `MODEL_COST_TRACKING`,
    /// `MODEL_RETRY_MAX_ATTEMPTS`, `MODEL_API_BASE_URL`).
    pub fn new(model_name: impl Into<String>) -> Result<Self, ConfigError> {
        let cost_tracking = match std::env::var(COST_TRACKING_ENV) {
            Ok(raw) => CostTrackingMode::parse(&raw)?,
            Err(_) => CostTrackingMode::default(),
        };

        Ok(Self {
            model_name: model_name.into(),
            model_kwargs: Map::new(),
            cache_control: None,
            cost_tracking,
            model_registry_path: std::env::var(MODEL_REGISTRY_PATH_ENV).ok().map(PathBuf::from),
            api_base_url: std::env::var(API_BASE_URL_ENV).ok(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            retry: RetryConfig::from_env()?,
        })
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.model_kwargs = kwargs;
        self
    }

    pub fn with_cache_control(mut self, mode: CacheControlMode) -> Self {
        self.cache_control = Some(mode);
        self
    }

    pub fn with_cost_tracking(mut self, mode: CostTrackingMode) -> Self {
        self.cost_tracking = mode;
        self
    }

    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_registry_path = Some(path.into());
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = var.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
