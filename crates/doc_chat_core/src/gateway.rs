//! crates/doc_chat_core/src/gateway.rs
//!
//! Issues the two token-carrying backend operations and normalizes whatever
//! comes back into a single `RequestOutcome` shape.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{Answer, BearerToken, DocumentFile, SessionId};
use crate::ports::{DocumentBackend, PortError, PortResult};

/// Shown when the upload endpoint fails without a usable `detail`.
pub const UPLOAD_FALLBACK: &str = "Failed to upload file";
/// Shown when the chat endpoint fails without a usable `detail`.
pub const CHAT_FALLBACK: &str = "Error processing your request";

//=========================================================================================
// Local Preconditions
//=========================================================================================

/// Reasons a request is refused before anything is sent over the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Please login first")]
    NotAuthenticated,
    #[error("You are already signed in")]
    AlreadyAuthenticated,
    #[error("Please upload a PDF first")]
    NoDocument,
    #[error("A document is already loaded. Log out to start over with a new one")]
    DocumentLoaded,
    #[error("Please enter a question")]
    BlankQuestion,
    #[error("Please select a PDF file")]
    MissingFile,
    #[error("Please upload a PDF file")]
    InvalidFileType,
    #[error("A request is already in progress")]
    Busy,
}

/// Checks the file name against the accepted document extensions (case-insensitive).
pub fn check_document_name(file_name: &str, extensions: &[String]) -> Result<(), Rejection> {
    let accepted = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false);
    if accepted {
        Ok(())
    } else {
        Err(Rejection::InvalidFileType)
    }
}

/// The final path component, if the path names a file at all.
pub fn document_name(path: &Path) -> Result<String, Rejection> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or(Rejection::MissingFile)
}

/// Loads a document from disk. A missing or unreadable file counts as "no file selected".
pub async fn read_document(path: &Path) -> Result<DocumentFile, Rejection> {
    let file_name = document_name(path)?;
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        warn!(path = %path.display(), "Document not found: {}", e);
        Rejection::MissingFile
    })?;
    if !metadata.is_file() {
        return Err(Rejection::MissingFile);
    }
    let contents = tokio::fs::read(path).await.map_err(|e| {
        warn!(path = %path.display(), "Failed to read document: {}", e);
        Rejection::MissingFile
    })?;
    Ok(DocumentFile {
        file_name,
        contents,
    })
}

//=========================================================================================
// Settled Request Outcomes
//=========================================================================================

/// A failed request, reduced to the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub message: String,
}

pub type RequestOutcome<T> = Result<T, RequestFailure>;

impl RequestFailure {
    /// Backend detail wins; a backend error without detail gets the fallback text;
    /// transport, auth and timeout errors keep their own message.
    pub fn from_port_error(err: &PortError, fallback: &str) -> Self {
        let message = match err {
            PortError::Backend { .. } => err.detail().unwrap_or(fallback).to_string(),
            other => {
                let text = other.to_string();
                if text.trim().is_empty() {
                    fallback.to_string()
                } else {
                    text
                }
            }
        };
        Self { message }
    }
}

/// Bounds a port call by the configured timeout, if any.
pub(crate) async fn with_timeout<T, F>(timeout: Option<Duration>, call: F) -> PortResult<T>
where
    F: Future<Output = PortResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(PortError::Timeout(limit))),
        None => call.await,
    }
}

//=========================================================================================
// The Gateway
//=========================================================================================

/// Wraps the backend port with timeouts and outcome normalization.
#[derive(Clone)]
pub struct RequestGateway {
    backend: Arc<dyn DocumentBackend>,
    timeout: Option<Duration>,
}

impl RequestGateway {
    pub fn new(backend: Arc<dyn DocumentBackend>, timeout: Option<Duration>) -> Self {
        Self { backend, timeout }
    }

    pub async fn upload(
        &self,
        token: &BearerToken,
        file: DocumentFile,
    ) -> RequestOutcome<SessionId> {
        debug!(file = %file.file_name, bytes = file.contents.len(), "Uploading document");
        with_timeout(self.timeout, self.backend.upload(token, file))
            .await
            .map_err(|e| {
                warn!("Upload failed: {}", e);
                RequestFailure::from_port_error(&e, UPLOAD_FALLBACK)
            })
    }

    pub async fn ask(
        &self,
        token: &BearerToken,
        session_id: &SessionId,
        message: &str,
    ) -> RequestOutcome<Answer> {
        debug!(session_id = %session_id, "Sending question");
        with_timeout(self.timeout, self.backend.chat(token, session_id, message))
            .await
            .map_err(|e| {
                warn!(session_id = %session_id, "Chat request failed: {}", e);
                RequestFailure::from_port_error(&e, CHAT_FALLBACK)
            })
    }
}
