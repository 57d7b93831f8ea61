use crate::config::settings::ModelConfig;
use crate::model::client::{CompletionProvider, CompletionResponse, ModelError, WireMessage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Completion provider speaking the OpenAI-compatible chat completions
/// protocol (the de facto wire format of hosted and local model gateways).
pub struct OpenAiProvider {
    base_url: String,
    api_key_env: String,
    http_client: Client,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            // No timeout: completion calls may legitimately take minutes.
            http_client: Client::new(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        let mut provider = match &config.api_base_url {
            Some(url) => Self::with_base_url(url.clone()),
            None => Self::new(),
        };
        provider.api_key_env = config.api_key_env.clone();
        provider
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        model: &str,
        messages: &[WireMessage],
        params: &Map<String, Value>,
    ) -> Result<CompletionResponse, ModelError> {
        let mut body = Map::new();
        body.insert("model".to_string(), Value::from(model));
        body.insert(
            "messages".to_string(),
            serde_json::to_value(messages)
                .map_err(|e| ModelError::Api(format!("failed to encode request: {e}")))?,
        );
        for (key, value) in params {
            body.insert(key.clone(), value.clone());
        }

        let url = self.endpoint();
        debug!(%url, model, n_messages = messages.len(), "sending completion request");

        let mut request = self.http_client.post(&url).json(&Value::Object(body));
        if let Ok(key) = std::env::var(&self.api_key_env) {
            if !key.is_empty() {
                request = request.bearer_auth(key);
            }
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body_text = response.text().await?;

        if (200..300).contains(&status) {
            serde_json::from_str(&body_text).map_err(|e| {
                ModelError::InvalidResponse(format!("failed to decode completion: {e}"))
            })
        } else {
            Err(classify_status(
                status,
                extract_error_message(&body_text),
                &self.api_key_env,
            ))
        }
    }
}

/// Map an HTTP error status onto the provider error taxonomy. Statuses not
/// classified as permanent come back as retryable variants.
fn classify_status(status: u16, message: String, api_key_env: &str) -> ModelError {
    match status {
        400 if mentions_context_window(&message) => ModelError::ContextWindowExceeded(message),
        400 => ModelError::UnsupportedParams(message),
        401 => ModelError::Authentication(format!(
            "{message} Set the {api_key_env} environment variable to a valid API key."
        )),
        403 => ModelError::PermissionDenied(message),
        404 => ModelError::NotFound(message),
        422 => ModelError::Api(message),
        429 => ModelError::RateLimited(message),
        _ => ModelError::Http { status, message },
    }
}

fn mentions_context_window(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("context window")
        || lower.contains("context length")
        || lower.contains("context_length_exceeded")
        || lower.contains("maximum context")
}

/// Pull a human-readable message out of an error body: the JSON `error`
/// field (string or `{message}` object), then `detail`, then the raw body.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("error") {
            Some(Value::String(s)) => return s.clone(),
            Some(Value::Object(obj)) => {
                if let Some(Value::String(s)) = obj.get("message") {
                    return s.clone();
                }
            }
            _ => {}
        }
        if let Some(Value::String(s)) = value.get("detail") {
            return s.clone();
        }
    }
    body.to_string()
}
