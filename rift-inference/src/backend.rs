//! HTTP client for an Ollama-compatible inference server.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client as HttpClient, StatusCode};
use rift_config::{GenerationOptions, InferenceConfig};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Raw response body of a streamed completion.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, InferenceError>> + Send>>;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const TAGS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    pub options: GenerationOptions,
}

/// An installed model as reported by `/api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Source of streamed completion bodies.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Open a streamed completion. Connection or HTTP status failures are
    /// reported as [`InferenceError::BackendUnavailable`].
    async fn open(&self, request: &CompletionRequest) -> Result<ByteStream, InferenceError>;

    /// Cheap liveness probe.
    async fn is_available(&self) -> bool;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, InferenceError>;
}

/// Strip a trailing slash and an OpenAI-style `/v1` suffix.
pub fn host_root(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .map_or(trimmed, |root| root.trim_end_matches('/'))
        .to_string()
}

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    http_client: HttpClient,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, InferenceError> {
        let http_client = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| InferenceError::BackendUnavailable(err.to_string()))?;
        Ok(Self {
            http_client,
            base_url: host_root(base_url),
        })
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.connect_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    fn map_reqwest_error(err: &reqwest::Error) -> InferenceError {
        if err.is_connect() || err.is_timeout() {
            InferenceError::BackendUnavailable(format!("cannot reach inference backend: {err}"))
        } else {
            InferenceError::BackendUnavailable(err.to_string())
        }
    }

    fn error_from_status(status: StatusCode, body: &str) -> InferenceError {
        // Ollama puts the reason in `{"error": "..."}`.
        let reason = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());

        if reason.is_empty() {
            InferenceError::BackendUnavailable(format!("request failed with status {status}"))
        } else {
            InferenceError::BackendUnavailable(format!("request failed ({status}): {reason}"))
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn open(&self, request: &CompletionRequest) -> Result<ByteStream, InferenceError> {
        let url = self.endpoint("generate");
        tracing::debug!(%url, model = %request.model, "opening completion stream");

        let response = self
            .http_client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| Self::map_reqwest_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|err| err.to_string());
            return Err(Self::error_from_status(status, &body));
        }

        let body = response.bytes_stream().map(|item| {
            item.map_err(|err| InferenceError::StreamInterrupted(err.to_string()))
        });
        Ok(Box::pin(body))
    }

    async fn is_available(&self) -> bool {
        match self
            .http_client
            .get(self.endpoint("tags"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "inference backend health probe failed");
                false
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, InferenceError> {
        let response = self
            .http_client
            .get(self.endpoint("tags"))
            .timeout(TAGS_TIMEOUT)
            .send()
            .await
            .map_err(|err| Self::map_reqwest_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|err| err.to_string());
            return Err(Self::error_from_status(status, &body));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|err| InferenceError::Backend(format!("malformed model list: {err}")))?;
        Ok(tags.models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: "mistral".to_string(),
            prompt: prompt.to_string(),
            system: Some("be brief".to_string()),
            stream: true,
            options: GenerationOptions::default(),
        }
    }

    async fn collect(mut body: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk.expect("chunk"));
        }
        out
    }

    #[test]
    fn host_root_strips_suffixes() {
        assert_eq!(host_root("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(host_root("http://localhost:11434/v1"), "http://localhost:11434");
        assert_eq!(host_root("http://gpu:11434/v1/"), "http://gpu:11434");
    }

    #[tokio::test]
    async fn open_posts_generate_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "mistral",
                "prompt": "scan summary",
                "system": "be brief",
                "stream": true,
                "options": { "num_ctx": 4096 }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("{\"response\":\"ok\",\"done\":true}\n", "application/x-ndjson"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(&server.uri(), Duration::from_secs(1)).expect("client");
        let body = backend.open(&request("scan summary")).await.expect("open");
        assert_eq!(collect(body).await, b"{\"response\":\"ok\",\"done\":true}\n".to_vec());
    }

    #[tokio::test]
    async fn error_status_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string("{\"error\":\"model 'mistral' not found\"}"),
            )
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(&server.uri(), Duration::from_secs(1)).expect("client");
        let err = backend
            .open(&request("hi"))
            .await
            .err()
            .expect("404 should fail");
        match err {
            InferenceError::BackendUnavailable(message) => {
                assert!(message.contains("not found"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_backend_unavailable() {
        let backend =
            OllamaBackend::new("http://127.0.0.1:9", Duration::from_millis(200)).expect("client");
        let err = backend.open(&request("hi")).await.err().expect("no server");
        assert!(matches!(err, InferenceError::BackendUnavailable(_)));
        assert!(!backend.is_available().await);
    }

    #[tokio::test]
    async fn lists_installed_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [
                    { "name": "mistral:7b-instruct-v0.2-q4_0", "size": 4109865159u64 },
                    { "name": "llama3:8b", "modified_at": "2024-05-01T10:00:00Z" }
                ]
            })))
            .mount(&server)
            .await;

        let backend = OllamaBackend::new(&server.uri(), Duration::from_secs(1)).expect("client");
        assert!(backend.is_available().await);
        let models = backend.list_models().await.expect("models");
        let names: Vec<&str> = models.iter().map(|model| model.name.as_str()).collect();
        assert_eq!(names, vec!["mistral:7b-instruct-v0.2-q4_0", "llama3:8b"]);
        assert_eq!(models.first().and_then(|model| model.size), Some(4_109_865_159));
    }
}
