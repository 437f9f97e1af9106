// src/cli/session.rs
//! Interactive notes screen: reads commands line by line and re-renders the
//! view whenever the client publishes a change.

use crate::application::NotesClient;
use crate::ports::TerminalPresenter;
use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::StreamExt;
use tracing::{debug, info};

pub const HELP: &str = "\
Commands:
  user NAME     load NAME's notes (empty NAME clears)
  filter TEXT   show only notes containing TEXT (empty TEXT clears)
  add TEXT      add a note for the current user
  rm ID         delete a note
  refresh       reload the current user's notes
  show          print the screen again
  help          print this help
  quit          leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    User(String),
    Filter(String),
    Add(String),
    Remove(i64),
    Refresh,
    Show,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "user" | "u" => SessionCommand::User(rest.to_string()),
        "filter" | "f" => SessionCommand::Filter(rest.to_string()),
        "add" | "a" => {
            if rest.is_empty() {
                return Err("usage: add TEXT".to_string());
            }
            SessionCommand::Add(rest.to_string())
        }
        "rm" | "delete" | "del" => {
            let id = rest
                .parse()
                .map_err(|_| format!("usage: rm ID (got '{rest}')"))?;
            SessionCommand::Remove(id)
        }
        "refresh" | "r" => SessionCommand::Refresh,
        "show" | "s" => SessionCommand::Show,
        "help" | "h" | "?" => SessionCommand::Help,
        "quit" | "q" | "exit" => SessionCommand::Quit,
        other => return Err(format!("unknown command '{other}', type `help`")),
    };
    Ok(Some(command))
}

/// Drive `client` from `input` until `quit` or end of input, writing every
/// new screen to `out`. The client is torn down on exit.
pub async fn run_session<R, W>(
    client: &dyn NotesClient,
    presenter: &TerminalPresenter,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut views = client.subscribe();
    let mut last_screen = String::new();
    info!("watch session started");

    loop {
        tokio::select! {
            Some(view) = views.next() => {
                let screen = presenter.render(&view);
                if screen != last_screen {
                    write!(out, "\n{screen}").context("Failed to write screen")?;
                    out.flush().context("Failed to flush output")?;
                    last_screen = screen;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    debug!("input closed");
                    break;
                };
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(SessionCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Some(text) = execute(client, presenter, command).await {
                            writeln!(out, "{text}").context("Failed to write output")?;
                        }
                    }
                    Err(message) => writeln!(out, "{message}").context("Failed to write output")?,
                }
            }
        }
    }

    client.teardown();
    info!("watch session ended");
    Ok(())
}

/// Apply a command; returns text to print directly, if any.
async fn execute(
    client: &dyn NotesClient,
    presenter: &TerminalPresenter,
    command: SessionCommand,
) -> Option<String> {
    match command {
        SessionCommand::User(person) => client.set_person(&person),
        SessionCommand::Filter(filter) => client.set_filter(&filter),
        SessionCommand::Add(text) => {
            if let Err(err) = client.add_note(&text).await {
                debug!(%err, "add failed");
            }
        }
        SessionCommand::Remove(id) => match client.delete_note(id).await {
            Ok(removed) if removed.is_empty() => return Some(format!("No note with id {id}")),
            Ok(_) => {}
            Err(err) => debug!(%err, "delete failed"),
        },
        SessionCommand::Refresh => client.refresh(),
        SessionCommand::Show => return Some(presenter.render(&client.view())),
        SessionCommand::Help => return Some(HELP.to_string()),
        SessionCommand::Quit => {}
    }
    None
}
