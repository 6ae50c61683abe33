//! crates/doc_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the client.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque, provider-assigned user reference.
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl Identity {
    /// The name shown to the user: display name first, then email, then the uid.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

/// An opaque bearer credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

// Identity and token always travel together.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identity: Identity,
    pub token: BearerToken,
}

/// Backend-issued handle naming one processed document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document read from disk, ready to be sent to the upload endpoint.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// A page reference plus the excerpt that supports an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    /// `None` when the backend could not attribute the excerpt to a page.
    pub page: Option<u32>,
    pub text: String,
}

/// The backend's reply to a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Who a turn is attributed to. Only assistant turns carry citations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnKind {
    User,
    Assistant { citations: Vec<Citation> },
    System,
    Error,
}

/// A single entry in the conversation transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub kind: TurnKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    fn new(kind: TurnKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnKind::User, content)
    }

    pub fn assistant(answer: Answer) -> Self {
        Self::new(
            TurnKind::Assistant {
                citations: answer.citations,
            },
            answer.text,
        )
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TurnKind::System, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(TurnKind::Error, content)
    }

    pub fn citations(&self) -> &[Citation] {
        match &self.kind {
            TurnKind::Assistant { citations } => citations,
            _ => &[],
        }
    }
}

/// The three workflow states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Anonymous,
    Authenticated,
    DocumentReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

/// The one-line status shown outside the transcript (login and upload progress).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}
