//! crates/doc_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) the session depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of a concrete identity provider or HTTP backend.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

use crate::domain::{Answer, BearerToken, DocumentFile, Identity, SessionId};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, auth SDKs).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    /// The backend answered with a non-success status.
    #[error("Backend returned status {status}")]
    Backend { status: u16, detail: Option<String> },
    /// The request never produced a usable response (unreachable host, bad body, ...).
    #[error("{0}")]
    Transport(String),
    /// The identity provider refused or failed.
    #[error("{0}")]
    Auth(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl PortError {
    /// The backend-provided detail text, when there is a non-empty one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            PortError::Backend {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => Some(detail),
            _ => None,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Identity change notifications: `Some` while a user is signed in, `None` otherwise.
pub type IdentityStream = Pin<Box<dyn Stream<Item = Option<Identity>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Runs the provider's interactive sign-in.
    async fn sign_in(&self) -> PortResult<Identity>;

    async fn sign_out(&self) -> PortResult<()>;

    /// Mints a fresh bearer token for the given user.
    async fn get_token(&self, identity: &Identity) -> PortResult<BearerToken>;

    /// Opens a standing subscription to identity changes. The stream ends when
    /// the provider shuts down; dropping it releases the subscription.
    fn watch(&self) -> IdentityStream;
}

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// `POST /upload`: sends the document and returns the session it was filed under.
    async fn upload(&self, token: &BearerToken, file: DocumentFile) -> PortResult<SessionId>;

    /// `POST /chat`: asks one question about an uploaded document.
    async fn chat(
        &self,
        token: &BearerToken,
        session_id: &SessionId,
        message: &str,
    ) -> PortResult<Answer>;
}
