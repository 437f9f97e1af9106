// src/util/testing.rs

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::application::{NoteService, NotesClient};
use crate::domain::{DomainError, Note, NotesView};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Build a note whose timestamp is derived from its id, so id order and
/// creation order agree.
pub fn note(id: i64, text: &str, person: &str) -> Note {
    Note {
        id,
        note: text.to_string(),
        person: person.to_string(),
        created_at: base_time() + ChronoDuration::seconds(id),
    }
}

/// In-memory [`NoteService`] with configurable failures and latency.
///
/// # Examples
///
/// ```
/// use noteflow::util::testing::MockNoteService;
///
/// let service = MockNoteService::builder()
///     .with_note("alice", "Buy milk")
///     .with_note("bob", "Call home")
///     .failing_create("quota exceeded")
///     .build();
/// assert_eq!(service.stored().len(), 2);
/// ```
pub struct MockNoteService {
    notes: Mutex<Vec<Note>>,
    next_id: Mutex<i64>,
    list_delays: HashMap<String, Duration>,
    create_delay: Option<Duration>,
    fail_list: AtomicBool,
    create_error: Option<String>,
    remove_error: Option<String>,
    list_calls: AtomicUsize,
    completed_lists: Mutex<Vec<String>>,
}

impl MockNoteService {
    pub fn builder() -> MockNoteServiceBuilder {
        MockNoteServiceBuilder::new()
    }

    /// Every stored note regardless of owner.
    pub fn stored(&self) -> Vec<Note> {
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Persons whose list call ran to completion, in completion order.
    pub fn completed_lists(&self) -> Vec<String> {
        self.completed_lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NoteService for MockNoteService {
    async fn list(&self, person: &str) -> Result<Vec<Note>, DomainError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delays.get(person) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(DomainError::RemoteError("connection refused".to_string()));
        }

        self.completed_lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(person.to_string());
        Ok(self
            .stored()
            .into_iter()
            .filter(|n| n.person == person)
            .collect())
    }

    async fn create(&self, note_text: &str, person: &str) -> Result<Vec<Note>, DomainError> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.create_error {
            return Err(DomainError::RemoteError(message.clone()));
        }

        let id = {
            let mut next = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        let inserted = note(id, note_text, person);
        self.notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(inserted.clone());
        Ok(vec![inserted])
    }

    async fn remove(&self, id: i64) -> Result<Vec<Note>, DomainError> {
        if let Some(message) = &self.remove_error {
            return Err(DomainError::RemoteError(message.clone()));
        }

        let mut notes = self.notes.lock().unwrap_or_else(PoisonError::into_inner);
        let (removed, kept): (Vec<Note>, Vec<Note>) =
            notes.drain(..).partition(|n| n.id == id);
        *notes = kept;
        Ok(removed)
    }
}

/// Builder for MockNoteService
///
/// Provides a fluent interface for configuring mock behavior.
pub struct MockNoteServiceBuilder {
    notes: Vec<Note>,
    list_delays: HashMap<String, Duration>,
    create_delay: Option<Duration>,
    fail_list: bool,
    create_error: Option<String>,
    remove_error: Option<String>,
}

impl MockNoteServiceBuilder {
    pub fn new() -> Self {
        Self {
            notes: vec![],
            list_delays: HashMap::new(),
            create_delay: None,
            fail_list: false,
            create_error: None,
            remove_error: None,
        }
    }

    /// Seed a note; ids are assigned in insertion order starting at 1
    pub fn with_note(mut self, person: &str, text: &str) -> Self {
        let id = self.notes.len() as i64 + 1;
        self.notes.push(note(id, text, person));
        self
    }

    /// Delay list calls for `person`, e.g. to observe cancellation
    pub fn with_list_delay(mut self, person: &str, delay: Duration) -> Self {
        self.list_delays.insert(person.to_string(), delay);
        self
    }

    /// Delay every create call
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_create(mut self, message: &str) -> Self {
        self.create_error = Some(message.to_string());
        self
    }

    pub fn failing_remove(mut self, message: &str) -> Self {
        self.remove_error = Some(message.to_string());
        self
    }

    pub fn build(self) -> MockNoteService {
        let next_id = self.notes.iter().map(|n| n.id).max().unwrap_or(0);
        MockNoteService {
            notes: Mutex::new(self.notes),
            next_id: Mutex::new(next_id),
            list_delays: self.list_delays,
            create_delay: self.create_delay,
            fail_list: AtomicBool::new(self.fail_list),
            create_error: self.create_error,
            remove_error: self.remove_error,
            list_calls: AtomicUsize::new(0),
            completed_lists: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MockNoteServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait until the client publishes a view matching `predicate`.
///
/// Panics after ten seconds of (possibly paused) runtime time.
pub async fn wait_for_view<C, F>(client: &C, predicate: F) -> NotesView
where
    C: NotesClient + ?Sized,
    F: Fn(&NotesView) -> bool,
{
    let mut views = client.subscribe();
    let found = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(view) = views.next().await {
            if predicate(&view) {
                return Some(view);
            }
        }
        None
    })
    .await;

    match found {
        Ok(Some(view)) => view,
        Ok(None) => panic!("view stream ended; last view: {:?}", client.view()),
        Err(_) => panic!("timed out waiting for view; last view: {:?}", client.view()),
    }
}

pub fn init_test_setup() -> Result<()> {
    // Set up logging first
    setup_test_logging();

    info!("Test Setup complete");
    Ok(())
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "trace");
    }

    // Create a filter for noisy modules
    let noisy_modules = ["hyper", "reqwest", "rustls", "mio"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    // Set up the subscriber with environment filter
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    // Build and set the subscriber
    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}
