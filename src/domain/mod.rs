// src/domain/mod.rs
pub mod error;
pub mod note;
pub mod view;

pub use error::DomainError;
pub use note::{NewNote, Note};
pub use view::NotesView;
