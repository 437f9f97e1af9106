// src/domain/view.rs
use serde::Serialize;

use super::Note;

/// Snapshot of what the notes screen shows at a given moment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesView {
    pub person: String,
    pub filter: String,
    /// Every note fetched for `person`, in service order.
    pub notes: Vec<Note>,
    /// `notes` after the client-side filter.
    pub visible: Vec<Note>,
    pub loading: bool,
    pub error: Option<String>,
    pub stale: bool,
}

impl NotesView {
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}
