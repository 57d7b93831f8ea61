pub mod settings;

pub use settings::{CacheControlMode, ConfigError, CostTrackingMode, ModelConfig, RetryConfig};
