pub mod config;
pub mod error;
pub mod model;
pub mod repository;
pub mod retrieval;

// Re-export commonly used types for convenience
pub use config::settings::{CacheControlMode, CostTrackingMode, ModelConfig, RetryConfig};
pub use error::{AppError, AppResult};
pub use model::{Message, ModelClient, ModelError, QueryResult, ToolCall, UsageStats};
pub use repository::{RepositoryClient, RepositoryError, RepositoryHandle};
pub use retrieval::{ContextSnippet, RetrievalClient, RetrievalError, RetrievalResult};
