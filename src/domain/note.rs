// src/domain/note.rs
use chrono::{DateTime, NaiveDateTime, ParseError, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A user-authored note as stored by the notes service.
///
/// `id` and `created_at` are assigned by the service; the client never
/// invents either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub note: String,
    pub person: String,
    #[serde(alias = "created_at", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a note; the service fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewNote {
    pub note: String,
    pub person: String,
}

impl NewNote {
    pub fn new(note: impl Into<String>, person: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            person: person.into(),
        }
    }
}

/// Parse a service timestamp.
///
/// Accepts RFC 3339 as well as the offset-less forms SQLite and Postgres
/// `timestamp` columns produce, which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
