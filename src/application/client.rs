// src/application/client.rs
use async_trait::async_trait;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;

use crate::constants::DEFAULT_STALE_AFTER_SECS;
use crate::domain::{DomainError, Note, NotesView};

/// Stream of view snapshots; the first item is the current view.
pub type ViewStream = Pin<Box<dyn Stream<Item = NotesView> + Send>>;

/// Which state-management strategy drives the notes screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Watch channels driven by a single select loop
    #[default]
    Stream,
    /// Signals with derived values and effects
    Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// How long a fetched list is considered fresh.
    pub stale_after: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        }
    }
}

/// State adapter between the notes screen and a [`NoteService`].
///
/// Setting the person fetches that person's notes; mutations reload the
/// list once the remote call succeeds. Failures never escape as panics: they
/// are recorded in [`NotesView::error`] and, for mutations, also returned.
///
/// [`NoteService`]: crate::application::NoteService
#[async_trait]
pub trait NotesClient: Send + Sync {
    fn set_person(&self, person: &str);

    fn set_filter(&self, filter: &str);

    /// Create a note for the current person; returns the inserted row(s).
    async fn add_note(&self, text: &str) -> Result<Vec<Note>, DomainError>;

    /// Delete by id; returns the deleted row(s), empty for an unknown id.
    async fn delete_note(&self, id: i64) -> Result<Vec<Note>, DomainError>;

    /// Re-fetch the current person's notes and clear the stale flag.
    fn refresh(&self);

    fn view(&self) -> NotesView;

    fn subscribe(&self) -> ViewStream;

    /// Cancel in-flight requests and the stale timer. Idempotent.
    fn teardown(&self);
}

/// Check add-note input before any remote call is made.
pub(crate) fn validate_new_note(person: &str, text: &str) -> Result<String, DomainError> {
    if person.trim().is_empty() {
        return Err(DomainError::InvalidInput(
            "enter a username before adding notes".to_string(),
        ));
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(DomainError::InvalidInput("note text is empty".to_string()));
    }
    Ok(text.to_string())
}

/// The message shown for a failed mutation.
pub(crate) fn mutation_message(err: &DomainError) -> String {
    match err {
        DomainError::RemoteError(message) | DomainError::StorageError(message) => message.clone(),
        other => other.to_string(),
    }
}
