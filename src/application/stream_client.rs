// src/application/stream_client.rs
//! Stream-based notes client.
//!
//! Inputs (person, filter) are watch channels and mutations travel over a
//! command channel. A single background task owns all state and publishes
//! [`NotesView`] snapshots on an output watch channel:
//!
//! ```text
//! person ──changed──► switch to new list call ─┐
//! filter ──changed──► recompute visible ───────┼──► view (watch) ──► WatchStream
//! commands ─────────► mutate, then reload ─────┤
//! stale deadline ───► mark stale ──────────────┘
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::client::{mutation_message, validate_new_note, ClientSettings, NotesClient, ViewStream};
use super::filter::filter_notes;
use super::NoteService;
use crate::constants::FETCH_FAILED_MESSAGE;
use crate::domain::{DomainError, Note, NotesView};

type FetchResult = (String, Result<Vec<Note>, DomainError>);
type FetchFuture = Pin<Box<dyn Future<Output = FetchResult> + Send>>;
type Reply = oneshot::Sender<Result<Vec<Note>, DomainError>>;

enum Command {
    Add { text: String, reply: Reply },
    Delete { id: i64, reply: Reply },
    Refresh,
}

/// Handle to the background pipeline. Dropping it tears the pipeline down.
pub struct StreamNotesClient {
    person_tx: watch::Sender<String>,
    filter_tx: watch::Sender<String>,
    commands: mpsc::UnboundedSender<Command>,
    view_rx: watch::Receiver<NotesView>,
    shutdown: CancellationToken,
}

impl StreamNotesClient {
    /// Start the pipeline on the current Tokio runtime.
    pub fn spawn<S>(service: Arc<S>, settings: ClientSettings) -> Self
    where
        S: NoteService + 'static,
    {
        let (person_tx, person_rx) = watch::channel(String::new());
        let (filter_tx, filter_rx) = watch::channel(String::new());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(NotesView::default());
        let shutdown = CancellationToken::new();

        let pipeline = Pipeline {
            service,
            settings,
            person_rx,
            filter_rx,
            commands: command_rx,
            view_tx,
            shutdown: shutdown.clone(),
            fetch: None,
            stale_at: None,
        };
        tokio::spawn(pipeline.run());

        Self {
            person_tx,
            filter_tx,
            commands,
            view_rx,
            shutdown,
        }
    }

    /// Raw receiver for callers that prefer `changed()` over a stream.
    pub fn watch(&self) -> watch::Receiver<NotesView> {
        self.view_rx.clone()
    }

    async fn request(
        &self,
        make: impl FnOnce(Reply) -> Command,
    ) -> Result<Vec<Note>, DomainError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| DomainError::ClientClosed)?;
        response.await.map_err(|_| DomainError::ClientClosed)?
    }
}

#[async_trait]
impl NotesClient for StreamNotesClient {
    fn set_person(&self, person: &str) {
        let person = person.trim().to_string();
        self.person_tx.send_if_modified(|current| {
            if *current == person {
                return false;
            }
            *current = person;
            true
        });
    }

    fn set_filter(&self, filter: &str) {
        let filter = filter.to_string();
        self.filter_tx.send_if_modified(|current| {
            if *current == filter {
                return false;
            }
            *current = filter;
            true
        });
    }

    async fn add_note(&self, text: &str) -> Result<Vec<Note>, DomainError> {
        let text = text.to_string();
        self.request(|reply| Command::Add { text, reply }).await
    }

    async fn delete_note(&self, id: i64) -> Result<Vec<Note>, DomainError> {
        self.request(|reply| Command::Delete { id, reply }).await
    }

    fn refresh(&self) {
        if self.commands.send(Command::Refresh).is_err() {
            debug!("refresh ignored, pipeline is closed");
        }
    }

    fn view(&self) -> NotesView {
        self.view_rx.borrow().clone()
    }

    fn subscribe(&self) -> ViewStream {
        Box::pin(WatchStream::new(self.view_rx.clone()))
    }

    fn teardown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for StreamNotesClient {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// State owned by the background task.
struct Pipeline<S> {
    service: Arc<S>,
    settings: ClientSettings,
    person_rx: watch::Receiver<String>,
    filter_rx: watch::Receiver<String>,
    commands: mpsc::UnboundedReceiver<Command>,
    view_tx: watch::Sender<NotesView>,
    shutdown: CancellationToken,
    /// The single in-flight list call; replacing it drops the old one.
    fetch: Option<FetchFuture>,
    stale_at: Option<Instant>,
}

impl<S> Pipeline<S>
where
    S: NoteService + 'static,
{
    async fn run(mut self) {
        info!("stream notes client running");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!(in_flight = self.fetch.is_some(), "stream notes client shutting down");
                    break;
                }

                changed = self.person_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let person = self.person_rx.borrow_and_update().clone();
                    self.start_fetch(person);
                }

                changed = self.filter_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let filter = self.filter_rx.borrow_and_update().clone();
                    trace!(%filter, "filter changed");
                    self.view_tx.send_modify(|view| {
                        view.visible = filter_notes(&view.notes, &filter);
                        view.filter = filter;
                    });
                }

                Some(command) = self.commands.recv() => {
                    self.handle(command).await;
                }

                (person, result) = next_fetch(&mut self.fetch) => {
                    self.fetch = None;
                    self.apply_fetch(&person, result);
                }

                _ = wait_stale(self.stale_at) => {
                    self.stale_at = None;
                    debug!("notes are stale");
                    self.view_tx.send_modify(|view| view.stale = true);
                }
            }
        }
    }

    fn current_person(&self) -> String {
        self.person_rx.borrow().clone()
    }

    #[instrument(level = "debug", skip(self))]
    fn start_fetch(&mut self, person: String) {
        self.stale_at = None;
        if self.fetch.take().is_some() {
            debug!("superseding in-flight fetch");
        }

        if person.is_empty() {
            self.view_tx.send_modify(|view| {
                view.person.clear();
                view.notes.clear();
                view.visible.clear();
                view.loading = false;
                view.error = None;
                view.stale = false;
            });
            return;
        }

        let service = Arc::clone(&self.service);
        let target = person.clone();
        self.fetch = Some(Box::pin(async move {
            let result = service.list(&target).await;
            (target, result)
        }));

        self.view_tx.send_modify(|view| {
            if view.person != person {
                view.notes.clear();
                view.visible.clear();
                view.person = person;
            }
            view.loading = true;
            view.error = None;
            view.stale = false;
        });
    }

    fn apply_fetch(&mut self, person: &str, result: Result<Vec<Note>, DomainError>) {
        match result {
            Ok(notes) => {
                info!(%person, count = notes.len(), "fetched notes");
                self.stale_at = Some(Instant::now() + self.settings.stale_after);
                self.view_tx.send_modify(|view| {
                    view.visible = filter_notes(&notes, &view.filter);
                    view.notes = notes;
                    view.loading = false;
                    view.error = None;
                    view.stale = false;
                });
            }
            Err(err) => {
                warn!(%person, %err, "fetch of notes failed");
                self.view_tx.send_modify(|view| {
                    view.loading = false;
                    view.error = Some(FETCH_FAILED_MESSAGE.to_string());
                });
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Add { text, reply } => {
                let person = self.current_person();
                let result = match validate_new_note(&person, &text) {
                    Ok(text) => {
                        let service = Arc::clone(&self.service);
                        cancellable(&self.shutdown, async move { service.create(&text, &person).await })
                            .await
                            .inspect(|inserted| debug!(count = inserted.len(), "note created"))
                    }
                    Err(err) => Err(err),
                };
                self.finish_mutation(result, reply).await;
            }
            Command::Delete { id, reply } => {
                let service = Arc::clone(&self.service);
                let result = cancellable(&self.shutdown, async move { service.remove(id).await })
                    .await
                    .inspect(|removed| debug!(id, count = removed.len(), "note removed"));
                self.finish_mutation(result, reply).await;
            }
            Command::Refresh => {
                let person = self.current_person();
                self.start_fetch(person);
            }
        }
    }

    async fn finish_mutation(&mut self, result: Result<Vec<Note>, DomainError>, reply: Reply) {
        let result = match result {
            Ok(rows) => self.reload().await.map(|()| rows),
            Err(DomainError::ClientClosed) => Err(DomainError::ClientClosed),
            Err(err) => {
                warn!(%err, "mutation failed");
                let message = mutation_message(&err);
                self.view_tx.send_modify(|view| view.error = Some(message));
                Err(err)
            }
        };
        let _ = reply.send(result);
    }

    /// Fetch the current person's notes inline, replacing any in-flight fetch.
    async fn reload(&mut self) -> Result<(), DomainError> {
        let person = self.current_person();
        self.start_fetch(person);
        let Some(fetch) = self.fetch.take() else {
            return Ok(());
        };
        let (person, result) = cancellable(&self.shutdown, async move { Ok(fetch.await) }).await?;
        self.apply_fetch(&person, result);
        Ok(())
    }

}

/// Run `work` unless the pipeline shuts down first.
async fn cancellable<T>(
    shutdown: &CancellationToken,
    work: impl Future<Output = Result<T, DomainError>>,
) -> Result<T, DomainError> {
    tokio::select! {
        _ = shutdown.cancelled() => Err(DomainError::ClientClosed),
        result = work => result,
    }
}

async fn next_fetch(fetch: &mut Option<FetchFuture>) -> FetchResult {
    match fetch {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

async fn wait_stale(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::{wait_for_view, MockNoteService};
    use std::time::Duration;

    fn spawn(service: MockNoteService) -> (Arc<MockNoteService>, StreamNotesClient) {
        let service = Arc::new(service);
        let client = StreamNotesClient::spawn(Arc::clone(&service), ClientSettings::default());
        (service, client)
    }

    #[tokio::test]
    async fn given_new_client_when_created_then_view_is_empty() {
        let (_, client) = spawn(MockNoteService::builder().build());

        assert_eq!(client.view(), NotesView::default());
    }

    #[tokio::test]
    async fn given_same_person_twice_when_setting_then_fetches_once() {
        let (service, client) = spawn(MockNoteService::builder().with_note("alice", "one").build());

        client.set_person("alice");
        wait_for_view(&client, |v| !v.loading && v.notes.len() == 1).await;
        client.set_person(" alice ");
        tokio::task::yield_now().await;

        assert_eq!(service.list_calls(), 1);
    }

    #[tokio::test]
    async fn given_watch_receiver_when_person_set_then_changed_fires() {
        let (_, client) = spawn(MockNoteService::builder().with_note("alice", "one").build());
        let mut rx = client.watch();

        client.set_person("alice");
        rx.changed().await.expect("pipeline alive");

        assert_eq!(rx.borrow().person, "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn given_refresh_during_slow_fetch_when_completing_then_only_latest_lands() {
        let (service, client) = spawn(
            MockNoteService::builder()
                .with_note("alice", "one")
                .with_list_delay("alice", Duration::from_millis(200))
                .build(),
        );

        client.set_person("alice");
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.refresh();
        let view = wait_for_view(&client, |v| !v.loading && v.notes.len() == 1).await;

        assert_eq!(view.notes[0].note, "one");
        assert_eq!(service.list_calls(), 2);
        assert_eq!(service.completed_lists(), vec!["alice".to_string()]);
    }
}
