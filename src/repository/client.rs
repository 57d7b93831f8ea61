use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

pub use crate::retrieval::client::CRA_BASE_URL_ENV;

/// Errors that can occur during repository management
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} is not set")]
    ConfigurationMissing(&'static str),

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

/// Server-side handle for an uploaded repository. The client does not
/// retain the id; callers must keep it for later retrieval and deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryHandle {
    pub repository_id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Raw status/message body returned by a delete call.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteOutcome {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    https_url: &'a str,
    commit_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Client for the CRA repository upload and delete endpoints.
///
/// Holds no mutable state; the base URL is resolved lazily on every call
/// (constructor override first, then `CRA_BASE_URL`) and validated before
/// any network I/O. Calls impose no client-side timeout.
#[derive(Debug, Clone, Default)]
pub struct RepositoryClient {
    http_client: reqwest::Client,
    base_url: Option<String>,
}

impl RepositoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn resolve_base_url(&self) -> Result<String, RepositoryError> {
        if let Some(url) = &self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        match std::env::var(CRA_BASE_URL_ENV) {
            Ok(value) if !value.is_empty() => Ok(value.trim_end_matches('/').to_string()),
            _ => Err(RepositoryError::ConfigurationMissing(CRA_BASE_URL_ENV)),
        }
    }

    /// Upload a git repository by HTTPS URL, optionally pinned to a commit.
    ///
    /// The response `data` must contain a `repository_id`; a 2xx body
    /// without one is malformed.
    pub async fn upload(
        &self,
        https_url: &str,
        commit_id: Option<&str>,
    ) -> Result<RepositoryHandle, RepositoryError> {
        let base_url = self.resolve_base_url()?;
        let url = format!("{base_url}/repository/upload/");
        debug!(%url, https_url, ?commit_id, "uploading repository");

        let payload = UploadRequest {
            https_url,
            commit_id,
        };
        let body = self
            .send(self.http_client.post(&url).json(&payload), url.clone())
            .await?;

        let envelope: DataEnvelope<Map<String, Value>> = serde_json::from_str(&body)
            .map_err(|e| RepositoryError::MalformedResponse(e.to_string()))?;
        if !envelope.data.contains_key("repository_id") {
            return Err(RepositoryError::MalformedResponse(format!(
                "upload response is missing the 'repository_id' field, got: {}",
                Value::Object(envelope.data)
            )));
        }
        serde_json::from_value(Value::Object(envelope.data))
            .map_err(|e| RepositoryError::MalformedResponse(e.to_string()))
    }

    /// Delete a previously uploaded repository by id.
    pub async fn delete(
        &self,
        repository_id: i64,
        force: bool,
    ) -> Result<DeleteOutcome, RepositoryError> {
        let base_url = self.resolve_base_url()?;
        let url = format!("{base_url}/repository/delete/");
        debug!(%url, repository_id, force, "deleting repository");

        let request = self.http_client.delete(&url).query(&[
            ("repository_id", repository_id.to_string()),
            ("force", force.to_string()),
        ]);
        let body = self.send(request, url).await?;

        serde_json::from_str(&body).map_err(|e| RepositoryError::MalformedResponse(e.to_string()))
    }

    /// Issue the request, surfacing transport failures as `Connection` and
    /// non-2xx statuses as `Remote`; returns the 2xx body text.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: String,
    ) -> Result<String, RepositoryError> {
        let response = request
            .send()
            .await
            .map_err(|source| RepositoryError::Connection {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| RepositoryError::Connection { url, source })?;

        if !(200..300).contains(&status) {
            return Err(RepositoryError::Remote {
                status,
                message: extract_error_message(&body),
            });
        }
        Ok(body)
    }
}

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
