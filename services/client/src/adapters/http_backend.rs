//! services/client/src/adapters/http_backend.rs
//!
//! This module contains the HTTP adapter for the document question-answering backend.
//! It implements the `DocumentBackend` port from the `core` crate using `reqwest`.

use async_trait::async_trait;
use doc_chat_core::domain::{Answer, BearerToken, Citation, DocumentFile, SessionId};
use doc_chat_core::ports::{DocumentBackend, PortError, PortResult};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `DocumentBackend` over the backend's REST endpoints.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    /// Creates a new `HttpBackend`. The timeout, if any, applies to every request.
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> PortResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PortError::Transport(format!("Invalid endpoint '{}': {}", path, e)))
    }

    /// `GET /health`: succeeds when the backend reports `{"status": "ok"}`.
    pub async fn check_health(&self) -> PortResult<()> {
        let response = self
            .client
            .get(self.endpoint("health")?)
            .send()
            .await
            .map_err(transport_error)?;
        let health: HealthResponse = decode(response).await?;
        if health.status == "ok" {
            Ok(())
        } else {
            Err(PortError::Transport(format!(
                "Backend reported status '{}'",
                health.status
            )))
        }
    }
}

/// `Url::join` drops the last path segment unless it ends with a slash.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn transport_error(e: reqwest::Error) -> PortError {
    PortError::Transport(e.to_string())
}

fn mime_for(file_name: &str) -> &'static str {
    if file_name.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

/// Reads the body, turning non-2xx statuses into `PortError::Backend` with the
/// `detail` text when the backend supplied one.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> PortResult<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport_error)?;
    if !status.is_success() {
        let detail = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_detail);
        warn!(status = status.as_u16(), ?detail, "Backend returned an error");
        return Err(PortError::Backend {
            status: status.as_u16(),
            detail,
        });
    }
    serde_json::from_slice(&body)
        .map_err(|e| PortError::Transport(format!("Malformed response from backend: {}", e)))
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    session_id: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    session_id: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    answer: String,
    #[serde(default)]
    sources: Option<Vec<SourceRecord>>,
}
impl ChatResponse {
    fn to_domain(self) -> Answer {
        Answer {
            text: self.answer,
            citations: self
                .sources
                .unwrap_or_default()
                .into_iter()
                .map(SourceRecord::to_domain)
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct SourceRecord {
    #[serde(default)]
    page: Value,
    #[serde(default)]
    text: String,
}
impl SourceRecord {
    fn to_domain(self) -> Citation {
        Citation {
            page: page_number(&self.page),
            text: self.text,
        }
    }
}

/// Pages arrive as numbers or as strings ("4", "Unknown").
fn page_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Value,
}
impl ErrorBody {
    /// Plain string details are used as-is; validation error lists are joined by message.
    fn into_detail(self) -> Option<String> {
        match self.detail {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => None,
        }
    }
}

//=========================================================================================
// `DocumentBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentBackend for HttpBackend {
    async fn upload(&self, token: &BearerToken, file: DocumentFile) -> PortResult<SessionId> {
        let mime = mime_for(&file.file_name);
        let part = Part::bytes(file.contents)
            .file_name(file.file_name)
            .mime_str(mime)
            .map_err(transport_error)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("upload")?)
            .bearer_auth(token.as_str())
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let body: UploadResponse = decode(response).await?;
        if body.session_id.trim().is_empty() {
            return Err(PortError::Transport(
                "Backend returned an empty session id".to_string(),
            ));
        }
        debug!(session_id = %body.session_id, "Upload accepted");
        Ok(SessionId::new(body.session_id))
    }

    async fn chat(
        &self,
        token: &BearerToken,
        session_id: &SessionId,
        message: &str,
    ) -> PortResult<Answer> {
        let request = ChatRequest {
            session_id: session_id.as_str(),
            message,
        };
        let response = self
            .client
            .post(self.endpoint("chat")?)
            .bearer_auth(token.as_str())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let body: ChatResponse = decode(response).await?;
        Ok(body.to_domain())
    }
}
