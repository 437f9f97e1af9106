use mockito::Matcher;
use noteflow::application::NoteService;
use noteflow::domain::DomainError;
use noteflow::infrastructure::RestNoteService;
use serde_json::json;

const KEY: &str = "anon-key";

fn auth_headers(mock: mockito::Mock) -> mockito::Mock {
    mock.match_header("apikey", KEY)
        .match_header("authorization", format!("Bearer {KEY}").as_str())
}

#[tokio::test]
async fn given_rows_when_listing_then_decodes_notes_in_server_order() {
    // Arrange
    let mut server = mockito::Server::new_async().await;
    let mock = auth_headers(server.mock("GET", "/rest/v1/notes"))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("select".into(), "*".into()),
            Matcher::UrlEncoded("person".into(), "eq.alice".into()),
            Matcher::UrlEncoded("order".into(), "created_at.asc,id.asc".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": 1, "note": "Buy milk", "person": "alice", "created_at": "2024-03-01T12:00:00.123456+00:00"},
                {"id": 4, "note": "Call Bob", "person": "alice", "created_at": "2024-03-02T08:30:00"}
            ])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let service = RestNoteService::new(&server.url(), KEY).unwrap();

    // Act
    let notes = service.list("alice").await.unwrap();

    // Assert
    mock.assert_async().await;
    let ids: Vec<i64> = notes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 4]);
    assert_eq!(notes[1].note, "Call Bob");
    assert_eq!(notes[1].created_at.to_rfc3339(), "2024-03-02T08:30:00+00:00");
}

#[tokio::test]
async fn given_note_when_creating_then_posts_row_and_returns_representation() {
    // Arrange
    let mut server = mockito::Server::new_async().await;
    let mock = auth_headers(server.mock("POST", "/rest/v1/notes"))
        .match_header("prefer", "return=representation")
        .match_body(Matcher::Json(json!([{"note": "Water plants", "person": "alice"}])))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            json!([{"id": 9, "note": "Water plants", "person": "alice", "created_at": "2024-03-03T10:00:00+00:00"}])
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let service = RestNoteService::new(&server.url(), KEY).unwrap();

    // Act
    let inserted = service.create("Water plants", "alice").await.unwrap();

    // Assert
    mock.assert_async().await;
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].id, 9);
}

#[tokio::test]
async fn given_id_when_removing_then_deletes_by_id_and_returns_rows() {
    let mut server = mockito::Server::new_async().await;
    let mock = auth_headers(server.mock("DELETE", "/rest/v1/notes"))
        .match_header("prefer", "return=representation")
        .match_query(Matcher::UrlEncoded("id".into(), "eq.7".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let service = RestNoteService::new(&server.url(), KEY).unwrap();

    let removed = service.remove(7).await.unwrap();

    mock.assert_async().await;
    assert!(removed.is_empty());
}

#[tokio::test]
async fn given_error_body_with_message_when_listing_then_returns_that_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/rest/v1/notes")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"JWT expired","code":"PGRST301"}"#)
        .create_async()
        .await;
    let service = RestNoteService::new(&server.url(), KEY).unwrap();

    let result = service.list("alice").await;

    assert_eq!(result, Err(DomainError::RemoteError("JWT expired".to_string())));
}

#[tokio::test]
async fn given_plain_bad_gateway_when_creating_then_reports_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/rest/v1/notes")
        .with_status(502)
        .with_body("upstream down")
        .create_async()
        .await;
    let service = RestNoteService::new(&server.url(), KEY).unwrap();

    let result = service.create("hello", "alice").await;

    assert_eq!(
        result,
        Err(DomainError::RemoteError(
            "Service responded with 502 Bad Gateway".to_string()
        ))
    );
}

#[tokio::test]
async fn given_non_json_success_body_when_listing_then_returns_remote_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/rest/v1/notes")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;
    let service = RestNoteService::new(&server.url(), KEY).unwrap();

    let result = service.list("alice").await;

    assert!(
        matches!(&result, Err(DomainError::RemoteError(m)) if m.starts_with("Unexpected response")),
        "{result:?}"
    );
}
