// src/ports/terminal.rs
use crate::domain::{Note, NotesView};
use crate::util::text::summarize;
use anyhow::{Context, Result};
use std::fmt::Write;
use tracing::instrument;

pub const STALE_PROMPT: &str = "Data may be stale. Type `refresh` to reload.";

/// Renders the notes screen as plain text.
#[derive(Debug)]
pub struct TerminalPresenter {
    width: usize,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self { width: 60 }
    }

    pub fn with_width(width: usize) -> Self {
        Self { width }
    }

    pub fn render_note(&self, note: &Note) -> String {
        format!(
            "  #{:<5} {}  {}",
            note.id,
            note.created_at.format("%Y-%m-%d %H:%M"),
            summarize(&note.note, self.width)
        )
    }

    #[instrument(level = "trace", skip_all)]
    pub fn render(&self, view: &NotesView) -> String {
        let mut out = String::new();

        if view.person.is_empty() {
            out.push_str("Enter a username to load notes.\n");
            return out;
        }

        let _ = write!(out, "Notes for {}", view.person);
        if view.filter.trim().is_empty() {
            let _ = writeln!(out, " ({})", view.notes.len());
        } else {
            let _ = writeln!(
                out,
                " ({} of {} match \"{}\")",
                view.visible.len(),
                view.notes.len(),
                view.filter.trim()
            );
        }

        if view.loading {
            out.push_str("  Loading...\n");
        } else if view.visible.is_empty() {
            out.push_str("  (no notes)\n");
        }
        for note in &view.visible {
            out.push_str(&self.render_note(note));
            out.push('\n');
        }

        if let Some(error) = &view.error {
            let _ = writeln!(out, "Error: {error}");
        }
        if view.stale {
            let _ = writeln!(out, "{STALE_PROMPT}");
        }
        out
    }

    pub fn render_json(&self, view: &NotesView) -> Result<String> {
        serde_json::to_string_pretty(&view.visible).context("Failed to serialize notes to JSON")
    }
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::new()
    }
}
