// src/infrastructure/sqlite.rs
use crate::application::NoteService;
use crate::constants::NOTES_TABLE;
use crate::domain::note::parse_timestamp;
use crate::domain::{DomainError, Note};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, instrument};

/// Where a [`SqliteNoteStore`] keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>` or a
    /// bare path.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            anyhow::bail!("Database URL is empty");
        }
        if url == "sqlite::memory:" || url == ":memory:" {
            return Ok(Self::Memory);
        }
        if url.contains("://") && !url.starts_with("sqlite://") {
            anyhow::bail!("Unsupported database URL (expected sqlite): {url}");
        }

        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        Ok(Self::File(PathBuf::from(path)))
    }
}

/// [`NoteService`] backed by a local SQLite database.
///
/// This is the persistence layer the remote service would sit on; running it
/// in-process lets the demo work without any server.
pub struct SqliteNoteStore {
    conn: Mutex<Connection>,
}

impl SqliteNoteStore {
    pub fn open(url: &str) -> Result<Self> {
        match DatabaseLocation::parse(url)? {
            DatabaseLocation::Memory => Self::in_memory(),
            DatabaseLocation::File(path) => Self::open_path(path),
        }
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(?path, "Opening notes database");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open notes database {}", path.display()))?;
        let store = Self::from_connection(conn)?;
        info!(?path, "Opened notes database");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {NOTES_TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                note TEXT NOT NULL,
                person TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );
            CREATE INDEX IF NOT EXISTS idx_{NOTES_TABLE}_person ON {NOTES_TABLE}(person);"
        ))
        .context("Failed to create notes schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, DomainError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn).map_err(|e| DomainError::StorageError(e.to_string()))
    }

    fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Note>> {
        conn.query_row(
            &format!("SELECT id, note, person, created_at FROM {NOTES_TABLE} WHERE id = ?1"),
            params![id],
            note_from_row,
        )
        .optional()
    }
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    let raw: String = row.get(3)?;
    let created_at = parse_timestamp(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Note {
        id: row.get(0)?,
        note: row.get(1)?,
        person: row.get(2)?,
        created_at,
    })
}

#[async_trait]
impl NoteService for SqliteNoteStore {
    #[instrument(level = "debug", skip(self))]
    async fn list(&self, person: &str) -> Result<Vec<Note>, DomainError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, note, person, created_at FROM {NOTES_TABLE}
                 WHERE person = ?1
                 ORDER BY created_at, id"
            ))?;
            let notes = stmt
                .query_map(params![person], note_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notes)
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn create(&self, note: &str, person: &str) -> Result<Vec<Note>, DomainError> {
        let inserted = self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO {NOTES_TABLE} (note, person) VALUES (?1, ?2)"),
                params![note, person],
            )?;
            Self::find(conn, conn.last_insert_rowid())
        })?;

        let inserted: Vec<Note> = inserted.into_iter().collect();
        info!(person, count = inserted.len(), "Inserted note");
        Ok(inserted)
    }

    #[instrument(level = "debug", skip(self))]
    async fn remove(&self, id: i64) -> Result<Vec<Note>, DomainError> {
        let removed = self.with_conn(|conn| {
            let existing = Self::find(conn, id)?;
            if existing.is_some() {
                conn.execute(
                    &format!("DELETE FROM {NOTES_TABLE} WHERE id = ?1"),
                    params![id],
                )?;
            }
            Ok(existing)
        })?;

        match &removed {
            Some(_) => info!(note_id = id, "Deleted note"),
            None => debug!(note_id = id, "No note to delete"),
        }
        Ok(removed.into_iter().collect())
    }
}
