// src/constants.rs
//
// Application-wide constants shared by the clients, adapters and CLI.

/// Message shown when listing notes fails, whatever the underlying cause.
pub const FETCH_FAILED_MESSAGE: &str = "Fetch of notes failed";

/// Seconds after a successful fetch before the screen offers a refresh.
///
/// Overridable through `client.stale_after_secs` or `NOTES_STALE_AFTER_SECS`.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 30;

/// Database used when neither the config file nor `DATABASE_URL` names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://noteflow.db";

/// Table and REST resource holding notes.
pub const NOTES_TABLE: &str = "notes";

/// Path prefix of the PostgREST-style notes endpoint.
pub const REST_PATH_PREFIX: &str = "rest/v1";

/// Timeout applied to every remote call made by the REST adapter.
pub const REMOTE_TIMEOUT_SECS: u64 = 10;

/// Environment variables consulted after the config file.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_SERVICE_URL: &str = "NOTES_SERVICE_URL";
pub const ENV_SERVICE_KEY: &str = "NOTES_SERVICE_KEY";
pub const ENV_STALE_AFTER_SECS: &str = "NOTES_STALE_AFTER_SECS";
