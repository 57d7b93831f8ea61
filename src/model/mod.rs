pub mod cache_control;
pub mod client;
pub mod openai;
pub mod query;
pub mod registry;
pub mod retry;
pub mod stats;

pub use client::{
    CompletionProvider, CompletionResponse, Message, ModelError, QueryResult, ToolCall,
    ToolFunction, WireMessage,
};
pub use openai::OpenAiProvider;
pub use query::ModelClient;
pub use registry::{ModelPricing, ModelRegistry};
pub use stats::UsageStats;
