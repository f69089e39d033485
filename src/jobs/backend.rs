//! Backend seam: the [`JobBackend`] trait and its `reqwest` implementation.
//!
//! The backend exposes two endpoints:
//!
//! | Call              | Request                                  | Response                               |
//! |-------------------|------------------------------------------|----------------------------------------|
//! | submit            | `POST /process/{kind}`, multipart `file` | `{ task_id, message, file_path }`      |
//! | status            | `GET /process/{task_id}`                 | `{ task_id, status, result?, error? }` |
//!
//! The task id is opaque and is sent as a single percent-encoded path
//! segment.
//!
//! The response shapes are owned by the backend.  Only the fields the client
//! acts on are required; everything else is optional or ignored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::upload::Upload;

use super::job::JobKind;

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Errors returned by a [`JobBackend`] call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("backend request timed out")]
    Timeout,

    /// The backend answered with a non-success status code.
    #[error("backend returned HTTP {0}")]
    Status(u16),

    /// The response body could not be parsed as the expected JSON.
    #[error("failed to parse backend response: {0}")]
    Parse(String),

    /// The submission response did not carry a task identifier.
    #[error("backend accepted the upload but returned no task id")]
    MissingTaskId,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else if e.is_decode() {
            BackendError::Parse(e.to_string())
        } else {
            BackendError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(alias = "id")]
    pub task_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Body of a status check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default, alias = "id")]
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// JobBackend trait
// ---------------------------------------------------------------------------

/// The two calls the job client needs from a backend.
///
/// Implementors must be `Send + Sync` so they can be shared with polling
/// tasks as `Arc<dyn JobBackend>`.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Upload `upload` and start a job of `kind`.
    async fn submit(&self, upload: Upload, kind: JobKind) -> Result<SubmitResponse, BackendError>;

    /// Fetch the current status of `task_id`.
    async fn status(&self, task_id: &str) -> Result<StatusResponse, BackendError>;
}

// ---------------------------------------------------------------------------
// HttpJobBackend
// ---------------------------------------------------------------------------

/// [`JobBackend`] over HTTP.  All connection details come from
/// [`BackendConfig`].
pub struct HttpJobBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpJobBackend {
    /// Build a backend client from config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// [`BackendConfig::timeout`]; `timeout_secs = 0` means no timeout.  A
    /// default (no-timeout) client is used if the builder fails.
    pub fn from_config(config: &BackendConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// `{base_url}/process/{task_id}` with the id pushed as one segment, so
    /// `/`, `?` and `#` inside it stay part of the id.
    fn status_url(&self, task_id: &str) -> Result<reqwest::Url, BackendError> {
        let base = self.url("/process");
        let mut url =
            reqwest::Url::parse(&base).map_err(|e| BackendError::Request(format!("{base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Request(format!("{base} cannot take a path")))?
            .push(task_id);
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => req.bearer_auth(key),
            _ => req,
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| BackendError::Parse(e.to_string()))
}

#[async_trait]
impl JobBackend for HttpJobBackend {
    async fn submit(&self, upload: Upload, kind: JobKind) -> Result<SubmitResponse, BackendError> {
        let url = self.url(&kind.submit_path());
        let (file_name, mime, bytes) = upload.into_parts();
        log::debug!("POST {url} ({file_name}, {} bytes)", bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&mime)
            .map_err(|e| BackendError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .authorize(self.client.post(&url).multipart(form))
            .send()
            .await?;
        let submitted: SubmitResponse = decode(response).await?;

        if submitted.task_id.trim().is_empty() {
            return Err(BackendError::MissingTaskId);
        }
        Ok(submitted)
    }

    async fn status(&self, task_id: &str) -> Result<StatusResponse, BackendError> {
        let url = self.status_url(task_id)?;
        log::debug!("GET {url}");

        let response = self.authorize(self.client.get(url)).send().await?;
        decode(response).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn backend_for(server: &mockito::Server, api_key: Option<&str>) -> HttpJobBackend {
        HttpJobBackend::from_config(&BackendConfig {
            base_url: server.url(),
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
        })
    }

    fn clip() -> Upload {
        Upload::new("clip.mp4", "video/mp4", b"fake video".to_vec())
    }

    #[tokio::test]
    async fn submit_posts_multipart_to_kind_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/process/summarization")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data".into()),
            )
            .match_body(Matcher::Regex("name=\"file\"; filename=\"clip.mp4\"".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "task_id": "abc",
                    "message": "queued",
                    "file_path": "/uploads/clip.mp4"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = backend_for(&server, None);
        let submitted = backend
            .submit(clip(), JobKind::Summarization)
            .await
            .expect("submit");

        mock.assert_async().await;
        assert_eq!(submitted.task_id, "abc");
        assert_eq!(submitted.file_path.as_deref(), Some("/uploads/clip.mp4"));
    }

    #[tokio::test]
    async fn submit_accepts_id_alias() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/process/transcription")
            .with_status(200)
            .with_body(r#"{"id":"xyz"}"#)
            .create_async()
            .await;

        let submitted = backend_for(&server, None)
            .submit(clip(), JobKind::Transcription)
            .await
            .expect("submit");
        assert_eq!(submitted.task_id, "xyz");
    }

    #[tokio::test]
    async fn submit_sends_bearer_token_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/process/translation")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(r#"{"task_id":"t1"}"#)
            .create_async()
            .await;

        backend_for(&server, Some("secret"))
            .submit(clip(), JobKind::Translation)
            .await
            .expect("submit");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_non_success_is_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/process/summarization")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = backend_for(&server, None)
            .submit(clip(), JobKind::Summarization)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status(500)));
    }

    #[tokio::test]
    async fn submit_empty_task_id_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/process/summarization")
            .with_status(200)
            .with_body(r#"{"task_id":""}"#)
            .create_async()
            .await;

        let err = backend_for(&server, None)
            .submit(clip(), JobKind::Summarization)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingTaskId));
    }

    #[tokio::test]
    async fn status_parses_completed_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/process/abc")
            .with_status(200)
            .with_body(
                json!({
                    "task_id": "abc",
                    "status": "completed",
                    "result": { "text": "hello", "language": "en" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let status = backend_for(&server, None).status("abc").await.expect("status");
        assert_eq!(status.status, "completed");
        assert_eq!(status.result, Some(json!({ "text": "hello", "language": "en" })));
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn status_percent_encodes_task_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/process/a%2Fb%3Fc%23d")
            .with_status(200)
            .with_body(r#"{"task_id":"a/b?c#d","status":"processing"}"#)
            .create_async()
            .await;

        let status = backend_for(&server, None)
            .status("a/b?c#d")
            .await
            .expect("status");
        mock.assert_async().await;
        assert_eq!(status.task_id, "a/b?c#d");
    }

    #[tokio::test]
    async fn zero_timeout_means_no_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/process/abc")
            .with_status(200)
            .with_body(r#"{"task_id":"abc","status":"queued"}"#)
            .create_async()
            .await;

        let backend = HttpJobBackend::from_config(&BackendConfig {
            base_url: server.url(),
            api_key: None,
            timeout_secs: 0,
        });
        let status = backend.status("abc").await.expect("status");
        assert_eq!(status.status, "queued");
    }

    #[tokio::test]
    async fn status_garbage_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/process/abc")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let err = backend_for(&server, None).status("abc").await.unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_request_error() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let backend = HttpJobBackend::from_config(&BackendConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: None,
            timeout_secs: 2,
        });
        let err = backend.status("abc").await.unwrap_err();
        assert!(matches!(err, BackendError::Request(_) | BackendError::Timeout));
    }

    #[test]
    fn backend_is_object_safe() {
        let backend: Box<dyn JobBackend> =
            Box::new(HttpJobBackend::from_config(&BackendConfig::default()));
        drop(backend);
    }
}
