//! services/client/src/terminal/commands.rs
//!
//! Parses one line of terminal input into a client command.

use std::path::PathBuf;

pub const HELP_TEXT: &str = "\
Commands:
  /login            sign in with the configured identity
  /logout           sign out and discard the current document
  /upload <path>    upload a PDF to chat about
  /status           show who is signed in and which document is loaded
  /help             show this help
  /quit             exit
Anything else is sent as a question about the uploaded document.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    Logout,
    /// An empty path is passed through so the session reports the missing file.
    Upload(PathBuf),
    Ask(String),
    Status,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

pub fn parse(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Ask(line.trim_end_matches(['\r', '\n']).to_string());
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    match name.to_ascii_lowercase().as_str() {
        "login" => Command::Login,
        "logout" => Command::Logout,
        "upload" => Command::Upload(PathBuf::from(unquote(argument))),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(name.to_string()),
    }
}

/// Paths dragged into a terminal often arrive wrapped in quotes.
fn unquote(argument: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = argument
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    argument
}
