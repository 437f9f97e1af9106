use anyhow::{Context, Result};
use noteflow::application::{build_client, ClientSettings, NotesClient, Strategy};
use noteflow::infrastructure::SqliteNoteStore;
use noteflow::util::testing::MockNoteService;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Test fixture for working with a temporary notes database file
#[allow(dead_code)]
pub struct TestDatabase {
    _temp_dir: TempDir,
    pub path: PathBuf,
}

#[allow(dead_code)]
impl TestDatabase {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let path = temp_dir.path().join("notes.db");
        Ok(Self {
            _temp_dir: temp_dir,
            path,
        })
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    pub fn open_store(&self) -> Result<SqliteNoteStore> {
        SqliteNoteStore::open(&self.url())
    }
}

/// Both strategies, so acceptance tests run against each.
#[allow(dead_code)]
pub const STRATEGIES: [Strategy; 2] = [Strategy::Stream, Strategy::Signal];

#[allow(dead_code)]
pub const STALE_AFTER: Duration = Duration::from_secs(30);

#[allow(dead_code)]
pub fn settings() -> ClientSettings {
    ClientSettings {
        stale_after: STALE_AFTER,
    }
}

/// Build a client for `strategy` over a shared mock service.
#[allow(dead_code)]
pub fn mock_client(
    strategy: Strategy,
    service: MockNoteService,
) -> (Arc<MockNoteService>, Box<dyn NotesClient>) {
    let service = Arc::new(service);
    let client = build_client(strategy, Arc::clone(&service), settings());
    (service, client)
}

/// Known fixture users
#[allow(dead_code)]
pub mod users {
    pub const ALICE: &str = "alice";
    pub const BOB: &str = "bob";
    pub const NOBODY: &str = "nobody";
}
