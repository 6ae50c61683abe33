//! services/client/src/terminal/render.rs
//!
//! Plain-text rendering of turns, status lines and the session summary.

use doc_chat_core::{Citation, Phase, SessionState, StatusLevel, StatusMessage, Turn, TurnKind};
use std::fmt::Write;

pub fn render_turn(turn: &Turn) -> String {
    let mut out = match &turn.kind {
        TurnKind::User => format!("You: {}", turn.content),
        TurnKind::Assistant { .. } => format!("Assistant: {}", turn.content),
        TurnKind::System => format!("[system] {}", turn.content),
        TurnKind::Error => format!("[error] {}", turn.content),
    };
    let citations = turn.citations();
    if !citations.is_empty() {
        out.push_str("\nSources:");
        for citation in citations {
            let _ = write!(out, "\n  - {}", render_citation(citation));
        }
    }
    out
}

fn render_citation(citation: &Citation) -> String {
    match citation.page {
        Some(page) => format!("Page {}: {}", page, citation.text),
        None => format!("Page ?: {}", citation.text),
    }
}

pub fn render_status(status: &StatusMessage) -> String {
    match status.level {
        StatusLevel::Info => format!("* {}", status.text),
        StatusLevel::Error => format!("! {}", status.text),
    }
}

/// What the user can do next in the given phase.
pub fn phase_hint(phase: Phase) -> &'static str {
    match phase {
        Phase::Anonymous => "Please /login to start chatting with your documents.",
        Phase::Authenticated => "Upload a PDF to start chatting: /upload <path>",
        Phase::DocumentReady => "Ask a question about your PDF.",
    }
}

pub fn render_summary(state: &SessionState) -> String {
    let mut out = String::new();
    match state.identity() {
        Some(identity) => {
            let _ = write!(out, "Signed in as {}", identity.label());
            if let Some(avatar) = &identity.avatar_url {
                let _ = write!(out, " (avatar: {})", avatar);
            }
        }
        None => out.push_str("Not signed in"),
    }
    match state.session_id() {
        Some(session_id) => {
            let _ = write!(
                out,
                "\nDocument session: {} ({} turns)",
                session_id,
                state.log().len()
            );
        }
        None => out.push_str("\nNo document loaded"),
    }
    if state.is_busy() {
        out.push_str("\nA request is in progress...");
    }
    out
}
