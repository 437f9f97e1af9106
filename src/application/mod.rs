// src/application/mod.rs
pub mod client;
pub mod filter;
pub mod service;
pub mod signal;
pub mod signal_client;
pub mod stream_client;

use std::sync::Arc;

pub use client::{ClientSettings, NotesClient, Strategy, ViewStream};
pub use filter::filter_notes;
pub use service::NoteService;
pub use signal_client::SignalNotesClient;
pub use stream_client::StreamNotesClient;

/// Build the client for `strategy` over `service`.
///
/// Must be called from within a Tokio runtime.
pub fn build_client<S>(
    strategy: Strategy,
    service: Arc<S>,
    settings: ClientSettings,
) -> Box<dyn NotesClient>
where
    S: NoteService + 'static,
{
    match strategy {
        Strategy::Stream => Box::new(StreamNotesClient::spawn(service, settings)),
        Strategy::Signal => Box::new(SignalNotesClient::new(service, settings)),
    }
}
