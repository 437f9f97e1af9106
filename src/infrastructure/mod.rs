// src/infrastructure/mod.rs
pub mod rest;
pub mod sqlite;

pub use rest::RestNoteService;
pub use sqlite::{DatabaseLocation, SqliteNoteStore};
