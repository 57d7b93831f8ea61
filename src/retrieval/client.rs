use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

/// Environment variable holding the CRA service base URL.
pub const CRA_BASE_URL_ENV: &str = "CRA_BASE_URL";
/// Environment variable holding the id of the uploaded repository to query.
pub const CRA_REPOSITORY_ID_ENV: &str = "CRA_REPOSITORY_ID";

/// Default number of query refinement rounds the service may perform.
pub const DEFAULT_MAX_REFINEMENTS: u32 = 3;

/// Errors that can occur during context retrieval
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("{0} is not set")]
    ConfigurationMissing(&'static str),

    #[error("Invalid {var} value: {message}")]
    InvalidConfiguration { var: &'static str, message: String },

    #[error("Failed to connect to CRA at {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("CRA returned error status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Failed to parse CRA response: {0}")]
    MalformedResponse(String),
}

/// One retrieved code snippet with its location in the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub relative_path: String,
    pub content: String,
    #[serde(rename = "start_line_number")]
    pub start_line: u64,
    #[serde(rename = "end_line_number")]
    pub end_line: u64,
}

/// Result of one retrieval call.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalResult {
    #[serde(default)]
    pub contexts: Vec<ContextSnippet>,
    #[serde(default)]
    pub total_contexts: usize,
}

#[derive(Debug, Serialize)]
struct RetrievalRequest<'a> {
    query: &'a str,
    max_refined_query_loop: u32,
    repository_id: i64,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Client for the CRA context retrieval endpoint.
///
/// Holds no mutable state; safe to share across threads. The base URL and
/// repository id are resolved lazily on every call (constructor overrides
/// first, then the environment) so late configuration takes effect.
#[derive(Debug, Clone, Default)]
pub struct RetrievalClient {
    http_client: reqwest::Client,
    base_url: Option<String>,
    repository_id: Option<i64>,
}

impl RetrievalClient {
    pub fn new() -> Self {
        // No timeout: retrieval may take arbitrarily long. Callers needing
        // bounded latency must wrap the call.
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_repository_id(mut self, id: i64) -> Self {
        self.repository_id = Some(id);
        self
    }

    fn resolve_base_url(&self) -> Result<String, RetrievalError> {
        if let Some(url) = &self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        match std::env::var(CRA_BASE_URL_ENV) {
            Ok(value) if !value.is_empty() => Ok(value.trim_end_matches('/').to_string()),
            _ => Err(RetrievalError::ConfigurationMissing(CRA_BASE_URL_ENV)),
        }
    }

    fn resolve_repository_id(&self) -> Result<i64, RetrievalError> {
        if let Some(id) = self.repository_id {
            return Ok(id);
        }
        match std::env::var(CRA_REPOSITORY_ID_ENV) {
            Ok(value) if !value.is_empty() => {
                value
                    .parse::<i64>()
                    .map_err(|_| RetrievalError::InvalidConfiguration {
                        var: CRA_REPOSITORY_ID_ENV,
                        message: format!("expected a numeric repository id, got '{value}'"),
                    })
            }
            _ => Err(RetrievalError::ConfigurationMissing(CRA_REPOSITORY_ID_ENV)),
        }
    }

    /// Retrieve context snippets relevant to `query`.
    ///
    /// Sends `{query, max_refined_query_loop, repository_id}` to
    /// `POST {base}/context/retrieve` and returns the `data` field of the
    /// response envelope. Both required settings are validated before any
    /// network call.
    pub async fn retrieve(
        &self,
        query: &str,
        max_refinements: u32,
    ) -> Result<RetrievalResult, RetrievalError> {
        let base_url = self.resolve_base_url()?;
        let repository_id = self.resolve_repository_id()?;
        let url = format!("{base_url}/context/retrieve");

        let payload = RetrievalRequest {
            query,
            max_refined_query_loop: max_refinements,
            repository_id,
        };
        debug!(%url, repository_id, max_refinements, "sending context retrieval request");

        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| RetrievalError::Connection {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| RetrievalError::Connection { url, source })?;

        if !(200..300).contains(&status) {
            return Err(RetrievalError::Remote {
                status,
                message: extract_error_message(&body),
            });
        }

        let envelope: DataEnvelope<RetrievalResult> = serde_json::from_str(&body)
            .map_err(|e| RetrievalError::MalformedResponse(e.to_string()))?;
        Ok(envelope.data)
    }

    /// Tool definition for agent registration (OpenAI function calling format).
    pub fn tool_definition() -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "context_retrieval",
                "description": "Retrieve relevant context from the codebase. \
                    Use this to search for code, documentation, or implementation details.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query describing what context you need \
                                to retrieve. Be specific about what you're looking for \
                                (e.g., 'authentication implementation', \
                                'error handling in API routes')."
                        },
                        "max_refined_query": {
                            "type": "integer",
                            "description": "Maximum number of query refinements to perform. \
                                Higher values may provide richer context but take longer.",
                            "default": DEFAULT_MAX_REFINEMENTS,
                            "minimum": 1
                        }
                    },
                    "required": ["query"]
                }
            }
        })
    }
}

/// Pull a message out of an error body: JSON `error` field, then `detail`,
/// then the raw body.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(s)) = value.get("error") {
            return s.clone();
        }
        if let Some(Value::String(s)) = value.get("detail") {
            return s.clone();
        }
    }
    body.to_string()
}
