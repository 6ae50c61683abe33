//! crates/doc_chat_core/src/conversation.rs
//!
//! The append-only transcript rendered to the user.

use crate::domain::Turn;

/// Ordered turns of the current document session.
///
/// Turns can only be appended. The whole log is dropped when the session ends
/// (logout) or when a new document replaces the previous one; both happen inside
/// the crate, so callers only ever observe growth.
#[derive(Debug, Default, Clone)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub(crate) fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
