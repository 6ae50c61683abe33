//! services/client/src/terminal/mod.rs
//!
//! The interactive front end: reads commands line by line and prints session
//! events as they happen.
//!
//! Login, logout and upload settle before the next line is read, because every
//! later command depends on the phase they leave behind. Questions run on their
//! own tasks so `/status` and `/quit` stay available while an answer is pending;
//! a second question in that window is refused as busy.

pub mod commands;
pub mod render;

use doc_chat_core::{Rejection, Session, SessionEvent, StatusMessage, TurnKind};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ClientError;
use commands::{Command, HELP_TEXT};

/// How the command loop ended.
enum Exit {
    /// `/quit`: outstanding questions are abandoned.
    Quit,
    /// End of input: outstanding questions are allowed to settle.
    EndOfInput,
}

/// Runs the command loop until `/quit` or end of input.
pub async fn run<R>(session: Session, input: R) -> Result<(), ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let done = CancellationToken::new();
    let printer = spawn_printer(session.subscribe(), done.clone());
    println!("{}", render::phase_hint(session.phase().await));

    let mut questions = JoinSet::new();
    let exit = read_commands(&session, input, &mut questions).await;

    match exit {
        Ok(Exit::EndOfInput) => {
            debug!(outstanding = questions.len(), "End of input, waiting for answers");
            while questions.join_next().await.is_some() {}
        }
        Ok(Exit::Quit) | Err(_) => {
            debug!(outstanding = questions.len(), "Abandoning outstanding questions");
            questions.shutdown().await;
        }
    }

    done.cancel();
    if let Err(e) = printer.await {
        warn!("Event printer stopped abnormally: {}", e);
    }
    exit.map(|_| ())
}

async fn read_commands<R>(
    session: &Session,
    input: R,
    questions: &mut JoinSet<()>,
) -> Result<Exit, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        // Reap finished questions so the set does not grow without bound.
        while questions.try_join_next().is_some() {}

        match commands::parse(&line) {
            Command::Empty => {}
            Command::Quit => return Ok(Exit::Quit),
            Command::Help => println!("{}", HELP_TEXT),
            Command::Status => println!("{}", render::render_summary(&session.snapshot().await)),
            Command::Unknown(name) => {
                println!("Unknown command '/{}'. Type /help for the list.", name)
            }
            Command::Login => report(session.login().await),
            Command::Logout => report(session.logout().await),
            Command::Upload(path) => report(session.upload(path).await.map(|_| ())),
            Command::Ask(question) => {
                let session = session.clone();
                questions.spawn(async move { report(session.ask(question).await.map(|_| ())) });
            }
        }
    }
    Ok(Exit::EndOfInput)
}

/// Other rejections already reach the user as a status event; a busy refusal
/// changes no state, so it is reported here.
fn report(result: Result<(), Rejection>) {
    if let Err(Rejection::Busy) = result {
        let status = StatusMessage::error(Rejection::Busy.to_string());
        println!("{}", render::render_status(&status));
    }
}

fn spawn_printer(
    mut events: broadcast::Receiver<SessionEvent>,
    done: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                // Queued events are printed before `done` is honoured.
                biased;
                event = events.recv() => match event {
                    Ok(event) => print_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Terminal fell behind the session events")
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = done.cancelled() => break,
            }
        }
    })
}

fn print_event(event: SessionEvent) {
    match event {
        // The user's own line is already on screen.
        SessionEvent::TurnAppended(turn) if turn.kind == TurnKind::User => {}
        SessionEvent::TurnAppended(turn) => println!("{}", render::render_turn(&turn)),
        SessionEvent::StatusChanged(status) => println!("{}", render::render_status(&status)),
        SessionEvent::PhaseChanged(phase) => println!("{}", render::phase_hint(phase)),
        SessionEvent::BusyChanged(true) => println!("..."),
        SessionEvent::BusyChanged(false) => {}
        SessionEvent::LogCleared => println!("--- conversation cleared ---"),
        // Nothing to scroll: the newest turn is always the last line printed.
        SessionEvent::ScrollToLatest => {}
    }
}
