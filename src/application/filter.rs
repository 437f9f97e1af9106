// src/application/filter.rs
use crate::domain::Note;

/// Keep the notes whose text contains `filter`, ignoring case.
///
/// Surrounding whitespace in the filter is ignored and an empty filter keeps
/// every note. Service order is preserved.
pub fn filter_notes(notes: &[Note], filter: &str) -> Vec<Note> {
    let needle = filter.trim().to_lowercase();
    if needle.is_empty() {
        return notes.to_vec();
    }

    notes
        .iter()
        .filter(|n| n.note.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
