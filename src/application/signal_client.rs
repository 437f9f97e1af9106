// src/application/signal_client.rs
//! Signal-based notes client.
//!
//! State lives in individual [`Signal`]s; the visible list is a [`Computed`]
//! over the notes and the filter, and an [`Effect`] on the person signal
//! starts a fetch. Every state transition ends by bumping a revision signal,
//! which is what view subscribers listen to, so one transition produces one
//! snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::{mutation_message, validate_new_note, ClientSettings, NotesClient, ViewStream};
use super::filter::filter_notes;
use super::signal::{Computed, Effect, Signal};
use super::NoteService;
use crate::constants::FETCH_FAILED_MESSAGE;
use crate::domain::{DomainError, Note, NotesView};

/// Signal graph plus the task handles it owns.
struct State<S> {
    service: Arc<S>,
    settings: ClientSettings,
    person: Signal<String>,
    filter: Signal<String>,
    notes: Signal<Vec<Note>>,
    visible: Computed<Vec<Note>>,
    loading: Signal<bool>,
    error: Signal<Option<String>>,
    stale: Signal<bool>,
    revision: Signal<u64>,
    /// Bumped by every fetch; results from older fetches are discarded.
    /// Held across the check and the writes that apply a result. Listeners
    /// of the signals written under it must never start a fetch.
    generation: Mutex<u64>,
    fetch_task: Mutex<Option<JoinHandle<()>>>,
    stale_timer: Mutex<Option<JoinHandle<()>>>,
    /// Senders behind every `subscribe()` stream; cleared on teardown.
    views: Mutex<Vec<mpsc::UnboundedSender<NotesView>>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl<S> State<S> {
    fn abort_tasks(&self) {
        for slot in [&self.fetch_task, &self.stale_timer] {
            if let Some(handle) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                handle.abort();
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop everything; the view keeps its last state and streams end.
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        *self.generation() += 1;
        self.abort_tasks();
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<S> State<S>
where
    S: NoteService + 'static,
{
    fn new(service: Arc<S>, settings: ClientSettings) -> Self {
        let notes = Signal::new(Vec::new());
        let filter = Signal::new(String::new());
        let visible = Computed::from2(&notes, &filter, |notes: &Vec<Note>, filter: &String| {
            filter_notes(notes, filter)
        });

        Self {
            service,
            settings,
            person: Signal::new(String::new()),
            filter,
            notes,
            visible,
            loading: Signal::new(false),
            error: Signal::new(None),
            stale: Signal::new(false),
            revision: Signal::new(0),
            generation: Mutex::new(0),
            fetch_task: Mutex::new(None),
            stale_timer: Mutex::new(None),
            views: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    fn snapshot(&self) -> NotesView {
        NotesView {
            person: self.person.get(),
            filter: self.filter.get(),
            notes: self.notes.get(),
            visible: self.visible.get(),
            loading: self.loading.get(),
            error: self.error.get(),
            stale: self.stale.get(),
        }
    }

    fn touch(&self) {
        self.revision.update(|r| *r += 1);
    }

    fn publish(&self) {
        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        if views.is_empty() {
            return;
        }
        let view = self.snapshot();
        views.retain(|tx| tx.send(view.clone()).is_ok());
    }

    /// Invalidate the in-flight fetch and timer and mark the list as loading.
    ///
    /// Returns the generation the new fetch must present, or `None` when
    /// there is no person to fetch for or the client is closed.
    fn begin_fetch(&self, person: &str, keep_notes: bool) -> Option<u64> {
        let mut current = self.generation();
        if self.is_closed() {
            return None;
        }
        self.abort_tasks();
        *current += 1;
        let generation = *current;
        self.stale.set(false);
        self.error.set(None);

        if person.is_empty() || !keep_notes {
            self.notes.set(Vec::new());
        }
        if person.is_empty() {
            self.loading.set(false);
            self.touch();
            return None;
        }
        self.loading.set(true);
        self.touch();
        Some(generation)
    }

    fn apply_fetch(self: &Arc<Self>, generation: u64, person: &str, result: Result<Vec<Note>, DomainError>) {
        let current = self.generation();
        if generation != *current {
            debug!(%person, generation, "discarding superseded fetch");
            return;
        }

        match result {
            Ok(notes) => {
                info!(%person, count = notes.len(), "fetched notes");
                self.notes.set(notes);
                self.error.set(None);
                self.arm_stale_timer(generation);
            }
            Err(err) => {
                warn!(%person, %err, "fetch of notes failed");
                self.error.set(Some(FETCH_FAILED_MESSAGE.to_string()));
            }
        }
        self.loading.set(false);
        self.touch();
    }

    // Caller holds the generation lock for `generation`.
    fn arm_stale_timer(self: &Arc<Self>, generation: u64) {
        let state = Arc::downgrade(self);
        let delay = self.settings.stale_after;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(state) = state.upgrade() {
                let current = state.generation();
                if *current == generation {
                    debug!("notes are stale");
                    state.stale.set(true);
                    state.touch();
                }
            }
        });
        let previous = self
            .stale_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Fetch in the background; used when the person changes or on refresh.
    #[instrument(level = "debug", skip(self))]
    fn spawn_fetch(self: &Arc<Self>, person: String, keep_notes: bool) {
        let Some(generation) = self.begin_fetch(&person, keep_notes) else {
            return;
        };

        let state = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = state.service.list(&person).await;
            state.apply_fetch(generation, &person, result);
        });
        *self.fetch_task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Fetch inline; used after a successful mutation.
    async fn reload(self: &Arc<Self>) -> Result<(), DomainError> {
        let person = self.person.get();
        let Some(generation) = self.begin_fetch(&person, true) else {
            return self.ensure_open();
        };
        let result = self.until_closed(self.service.list(&person)).await?;
        self.apply_fetch(generation, &person, result);
        Ok(())
    }

    /// Run a remote call unless the client is torn down first.
    async fn until_closed<T>(
        &self,
        work: impl std::future::Future<Output = T>,
    ) -> Result<T, DomainError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(DomainError::ClientClosed),
            result = work => Ok(result),
        }
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_closed() {
            return Err(DomainError::ClientClosed);
        }
        Ok(())
    }

    async fn finish_mutation(
        self: &Arc<Self>,
        result: Result<Vec<Note>, DomainError>,
    ) -> Result<Vec<Note>, DomainError> {
        match result {
            Ok(rows) => {
                self.reload().await?;
                Ok(rows)
            }
            Err(DomainError::ClientClosed) => Err(DomainError::ClientClosed),
            Err(err) => self.fail_mutation(err),
        }
    }

    fn fail_mutation<T>(&self, err: DomainError) -> Result<T, DomainError> {
        warn!(%err, "mutation failed");
        self.error.set(Some(mutation_message(&err)));
        self.touch();
        Err(err)
    }
}

/// Notes client built from signals.
///
/// Must be created and driven from within a Tokio runtime, since the person
/// effect spawns fetch tasks.
pub struct SignalNotesClient<S> {
    state: Arc<State<S>>,
    effects: Mutex<Vec<Effect>>,
}

impl<S> SignalNotesClient<S>
where
    S: NoteService + 'static,
{
    pub fn new(service: Arc<S>, settings: ClientSettings) -> Self {
        let state = Arc::new(State::new(service, settings));

        let weak: Weak<State<S>> = Arc::downgrade(&state);
        let on_person = state.person.subscribe(move |person: &String| {
            if let Some(state) = weak.upgrade() {
                state.spawn_fetch(person.clone(), false);
            }
        });
        let weak: Weak<State<S>> = Arc::downgrade(&state);
        let on_revision = state.revision.subscribe(move |_| {
            if let Some(state) = weak.upgrade() {
                state.publish();
            }
        });
        info!("signal notes client ready");

        Self {
            state,
            effects: Mutex::new(vec![on_person, on_revision]),
        }
    }
}

#[async_trait]
impl<S> NotesClient for SignalNotesClient<S>
where
    S: NoteService + 'static,
{
    fn set_person(&self, person: &str) {
        if self.state.is_closed() {
            return;
        }
        self.state.person.set_if_changed(person.trim().to_string());
    }

    fn set_filter(&self, filter: &str) {
        if self.state.is_closed() {
            return;
        }
        if self.state.filter.set_if_changed(filter.to_string()) {
            self.state.touch();
        }
    }

    async fn add_note(&self, text: &str) -> Result<Vec<Note>, DomainError> {
        self.state.ensure_open()?;
        let person = self.state.person.get();
        let text = match validate_new_note(&person, text) {
            Ok(text) => text,
            Err(err) => return self.state.fail_mutation(err),
        };

        let result = self
            .state
            .until_closed(self.state.service.create(&text, &person))
            .await
            .and_then(|created| created)
            .inspect(|inserted| debug!(count = inserted.len(), "note created"));
        self.state.finish_mutation(result).await
    }

    async fn delete_note(&self, id: i64) -> Result<Vec<Note>, DomainError> {
        self.state.ensure_open()?;

        let result = self
            .state
            .until_closed(self.state.service.remove(id))
            .await
            .and_then(|removed| removed)
            .inspect(|removed| debug!(id, count = removed.len(), "note removed"));
        self.state.finish_mutation(result).await
    }

    fn refresh(&self) {
        self.state.spawn_fetch(self.state.person.get(), true);
    }

    fn view(&self) -> NotesView {
        self.state.snapshot()
    }

    fn subscribe(&self) -> ViewStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.state.snapshot());
        if !self.state.is_closed() {
            self.state
                .views
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(tx);
        }
        Box::pin(UnboundedReceiverStream::new(rx))
    }

    fn teardown(&self) {
        if self.state.is_closed() {
            return;
        }
        debug!("signal notes client torn down");
        self.effects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.state.close();
    }
}

impl<S> Drop for SignalNotesClient<S> {
    fn drop(&mut self) {
        self.state.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::{wait_for_view, MockNoteService};

    fn client(service: MockNoteService) -> (Arc<MockNoteService>, SignalNotesClient<MockNoteService>) {
        let service = Arc::new(service);
        let client = SignalNotesClient::new(Arc::clone(&service), ClientSettings::default());
        (service, client)
    }

    #[tokio::test]
    async fn given_person_when_set_then_visible_is_derived_from_filter() {
        let (_, client) = client(
            MockNoteService::builder()
                .with_note("alice", "Buy milk")
                .with_note("alice", "Walk dog")
                .build(),
        );

        client.set_person("alice");
        wait_for_view(&client, |v| v.notes.len() == 2).await;
        client.set_filter("dog");

        let view = client.view();
        assert_eq!(view.visible.len(), 1);
        assert_eq!(view.visible[0].note, "Walk dog");
    }

    #[tokio::test]
    async fn given_subscriber_when_filter_changes_then_receives_one_snapshot() {
        let (_, client) = client(MockNoteService::builder().build());
        let before = client.state.revision.get();

        client.set_filter("x");
        client.set_filter("x");

        assert_eq!(client.state.revision.get(), before + 1);
    }

    #[tokio::test]
    async fn given_teardown_when_inputs_change_then_view_stays_as_it_was() {
        let (service, client) = client(MockNoteService::builder().with_note("alice", "one").build());

        client.teardown();
        client.set_person("alice");
        client.set_filter("x");
        client.refresh();
        tokio::task::yield_now().await;

        assert_eq!(service.list_calls(), 0);
        assert_eq!(client.view(), NotesView::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn given_rapid_person_switches_on_many_workers_when_settled_then_only_latest_notes_land() {
        let (_, client) = client(
            MockNoteService::builder()
                .with_note("alice", "a1")
                .with_note("bob", "b1")
                .with_note("alice", "a2")
                .build(),
        );

        for round in 0..100 {
            let (from, to) = if round % 2 == 0 { ("alice", "bob") } else { ("bob", "alice") };
            client.set_person(from);
            client.set_person(to);

            let view = wait_for_view(&client, |v| v.person == to && !v.loading).await;
            assert!(view.notes.iter().all(|n| n.person == to), "round {round}: {view:?}");
            assert!(!view.notes.is_empty(), "round {round}: {view:?}");
        }
    }

    #[tokio::test]
    async fn given_subscriber_when_torn_down_then_stream_ends() {
        use tokio_stream::StreamExt;
        let (_, client) = client(MockNoteService::builder().build());
        let mut views = client.subscribe();
        assert_eq!(views.next().await, Some(NotesView::default()));

        client.teardown();

        assert_eq!(views.next().await, None);
        let mut late = client.subscribe();
        assert_eq!(late.next().await, Some(NotesView::default()));
        assert_eq!(late.next().await, None);
    }

    #[tokio::test]
    async fn given_teardown_when_adding_then_returns_client_closed() {
        let (_, client) = client(MockNoteService::builder().build());

        client.teardown();
        let result = client.add_note("hello").await;

        assert_eq!(result, Err(DomainError::ClientClosed));
    }
}
