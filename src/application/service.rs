// src/application/service.rs
use async_trait::async_trait;

use crate::domain::{DomainError, Note};

/// The remote surface a notes client depends on.
///
/// Implementations are shared between a client and its background tasks,
/// hence `Send + Sync`.
#[async_trait]
pub trait NoteService: Send + Sync {
    /// Notes owned by `person`, oldest first.
    async fn list(&self, person: &str) -> Result<Vec<Note>, DomainError>;

    /// Insert a note for `person` and return the inserted row(s).
    async fn create(&self, note: &str, person: &str) -> Result<Vec<Note>, DomainError>;

    /// Delete by id and return the deleted row(s).
    ///
    /// An unknown id is not an error; the result is simply empty.
    async fn remove(&self, id: i64) -> Result<Vec<Note>, DomainError>;
}
