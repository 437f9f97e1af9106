// src/infrastructure/rest.rs
use crate::application::NoteService;
use crate::constants::{NOTES_TABLE, REMOTE_TIMEOUT_SECS, REST_PATH_PREFIX};
use crate::domain::{DomainError, NewNote, Note};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Url};
use std::time::Duration;
use tracing::{debug, instrument};

/// [`NoteService`] talking to a PostgREST-style endpoint, such as a hosted
/// Postgres with a REST gateway.
pub struct RestNoteService {
    client: Client,
    notes_url: Url,
}

impl RestNoteService {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let notes_url = notes_url(base_url)?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key).context("Service key is not a valid header")?;
        headers.insert("apikey", key);
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("Service key is not a valid header")?;
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        debug!(%notes_url, "Created REST note service");
        Ok(Self { client, notes_url })
    }

    pub fn notes_url(&self) -> &Url {
        &self.notes_url
    }

    fn list_url(&self, person: &str) -> Url {
        let mut url = self.notes_url.clone();
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("person", &format!("eq.{person}"))
            .append_pair("order", "created_at.asc,id.asc");
        url
    }

    fn id_url(&self, id: i64) -> Url {
        let mut url = self.notes_url.clone();
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<Note>, DomainError> {
        let response = request
            .send()
            .await
            .map_err(|e| DomainError::RemoteError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::RemoteError(remote_message(status, &body)));
        }

        response
            .json::<Vec<Note>>()
            .await
            .map_err(|e| DomainError::RemoteError(format!("Unexpected response: {e}")))
    }
}

/// `<base>/rest/v1/notes`, tolerating a trailing slash on the base.
fn notes_url(base_url: &str) -> Result<Url> {
    let base = base_url.trim().trim_end_matches('/');
    Url::parse(&format!("{base}/{REST_PATH_PREFIX}/{NOTES_TABLE}"))
        .with_context(|| format!("Invalid service URL: {base_url}"))
}

/// Prefer the `message` field of a PostgREST error body.
fn remote_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("Service responded with {status}"))
}

#[async_trait]
impl NoteService for RestNoteService {
    #[instrument(level = "debug", skip(self))]
    async fn list(&self, person: &str) -> Result<Vec<Note>, DomainError> {
        self.send(self.client.get(self.list_url(person))).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn create(&self, note: &str, person: &str) -> Result<Vec<Note>, DomainError> {
        let body = vec![NewNote::new(note, person)];
        self.send(
            self.client
                .post(self.notes_url.clone())
                .header("Prefer", "return=representation")
                .json(&body),
        )
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn remove(&self, id: i64) -> Result<Vec<Note>, DomainError> {
        self.send(
            self.client
                .delete(self.id_url(id))
                .header("Prefer", "return=representation"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_base_with_trailing_slash_when_building_then_joins_cleanly() {
        let service = RestNoteService::new("https://example.test/", "key").unwrap();

        assert_eq!(
            service.notes_url().as_str(),
            "https://example.test/rest/v1/notes"
        );
    }

    #[test]
    fn given_person_when_building_list_url_then_filters_and_orders() {
        let service = RestNoteService::new("https://example.test", "key").unwrap();

        let url = service.list_url("ann smith");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("person".to_string(), "eq.ann smith".to_string())));
        assert!(pairs.contains(&("order".to_string(), "created_at.asc,id.asc".to_string())));
    }

    #[test]
    fn given_id_when_building_delete_url_then_uses_eq_filter() {
        let service = RestNoteService::new("https://example.test", "key").unwrap();

        assert_eq!(
            service.id_url(12).as_str(),
            "https://example.test/rest/v1/notes?id=eq.12"
        );
    }

    #[test]
    fn given_invalid_base_when_building_then_fails() {
        assert!(RestNoteService::new("not a url", "key").is_err());
    }

    #[test]
    fn given_key_with_newline_when_building_then_fails() {
        assert!(RestNoteService::new("https://example.test", "bad\nkey").is_err());
    }

    #[test]
    fn given_error_body_with_message_when_formatting_then_uses_message() {
        let message = remote_message(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"message":"JWT expired","code":"PGRST301"}"#,
        );

        assert_eq!(message, "JWT expired");
    }

    #[test]
    fn given_plain_error_body_when_formatting_then_uses_status() {
        let message = remote_message(reqwest::StatusCode::BAD_GATEWAY, "upstream down");

        assert_eq!(message, "Service responded with 502 Bad Gateway");
    }
}
