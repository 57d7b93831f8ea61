use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur during model queries
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unsupported parameters: {0}")]
    UnsupportedParams(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Context window exceeded: {0}")]
    ContextWindowExceeded(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Query interrupted")]
    Interrupted,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Model registry error: {0}")]
    Registry(String),

    #[error("Cost calculation failed for model {model}: {reason}")]
    CostCalculation { model: String, reason: String },
}

impl ModelError {
    /// Whether the retry loop may re-issue the request after this error.
    ///
    /// Everything is retryable except provider-classified permanent failures,
    /// user interruption, and cost/registry problems (which happen after the
    /// request already succeeded).
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ModelError::UnsupportedParams(_)
                | ModelError::NotFound(_)
                | ModelError::PermissionDenied(_)
                | ModelError::ContextWindowExceeded(_)
                | ModelError::Api(_)
                | ModelError::Authentication(_)
                | ModelError::Interrupted
                | ModelError::Registry(_)
                | ModelError::CostCalculation { .. }
        )
    }
}

/// The function invocation inside a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    /// Serialized JSON arguments, exactly as the provider emitted them.
    pub arguments: String,
}

/// A structured function-invocation request emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunction,
}

/// A conversation message supplied by the caller.
///
/// Unknown keys end up in `extra` when deserializing caller-provided JSON;
/// the wire projection ([`WireMessage::from`]) drops them, so they never
/// reach the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Cache marker attached to a content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub kind: String,
}

impl CacheControl {
    pub fn ephemeral() -> Self {
        Self {
            kind: "ephemeral".to_string(),
        }
    }
}

/// One element of block-form message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
            cache_control: None,
        }
    }
}

/// Message content on the wire: a plain string, or blocks when cache
/// control markers are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// The projection of a [`Message`] actually transmitted to the provider:
/// role, content, and tool fields only when present. The provider is strict
/// about accepted fields, so nothing else may appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: WireContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.clone(),
            content: WireContent::Text(msg.content.clone().unwrap_or_default()),
            tool_calls: msg.tool_calls.clone(),
            tool_call_id: msg.tool_call_id.clone(),
            name: msg.name.clone(),
        }
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The assistant message inside a completion choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw completion returned by a provider. Unknown fields are preserved in
/// the flattened maps so the full payload survives into
/// [`QueryResult::extra`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw provider payload carried alongside the normalized result.
#[derive(Debug, Clone, Serialize)]
pub struct ResultExtra {
    pub response: Value,
}

/// Normalized result of a model query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    pub extra: ResultExtra,
}

/// Trait for completion providers that turn a message list into a response
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Issue a single completion request. Retrying is the caller's concern.
    async fn complete(
        &self,
        model: &str,
        messages: &[WireMessage],
        params: &Map<String, Value>,
    ) -> Result<CompletionResponse, ModelError>;
}
