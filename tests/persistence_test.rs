//! Credentials and cookies written by one session must be visible to the
//! next one opened on the same data directory.

mod common;

use common::{reissued, BackendResponse};
use myssue::adapters::PREFERENCES_FILE;
use myssue::startup::{ClientConfig, Session};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer};

fn config(server: &MockServer, data_dir: &TempDir) -> ClientConfig {
    ClientConfig::new()
        .with_base_url(server.uri())
        .with_data_dir(data_dir.path())
}

#[tokio::test]
async fn test_session_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/device"))
        .respond_with(
            BackendResponse::new(200)
                .with_token("tok")
                .with_cookie("refreshToken=r1; Path=/; HttpOnly")
                .with_json(json!({ "userId": 42 }))
                .build(),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/reissue"))
        .and(header("cookie", "refreshToken=r1"))
        .respond_with(reissued("tok2"))
        .expect(1)
        .mount(&server)
        .await;

    let data_dir = TempDir::new().unwrap();

    let first = Session::connect(config(&server, &data_dir)).unwrap();
    let outcome = first.register_if_needed(None).await;
    assert!(outcome.is_registered());
    let device_uuid = first.cache().device_uuid().unwrap();
    first.shutdown().await;
    drop(first);

    let second = Session::connect(config(&server, &data_dir)).unwrap();
    let creds = second.cache().credentials();
    assert_eq!(creds.access_token.as_deref(), Some("tok"));
    assert_eq!(creds.user_id, Some(42));
    assert_eq!(creds.device_uuid.as_deref(), Some(device_uuid.as_str()));

    // A restarted installation with a user id never registers again.
    assert!(second.spawn_registration(None).await.unwrap().is_none());

    assert_eq!(second.reissue().await.unwrap(), "tok2");
    second.shutdown().await;
}

#[tokio::test]
async fn test_preferences_file_layout() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    let session = Session::connect(config(&server, &data_dir)).unwrap();
    session.cache().save_device_uuid("uuid-1");
    session.cache().save_user_id(7);
    session.cache().save_token("tok");
    session.shutdown().await;

    let raw = std::fs::read_to_string(data_dir.path().join(PREFERENCES_FILE)).unwrap();
    let doc: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["uuid"], "uuid-1");
    assert_eq!(doc["user_id"], 7);
    assert_eq!(doc["access_token"], "tok");
}

#[tokio::test]
async fn test_clear_removes_credentials_from_disk() {
    let server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    let session = Session::connect(config(&server, &data_dir)).unwrap();
    session.cache().save_token("tok");
    session.cache().save_user_id(7);
    session.shutdown().await;

    session.cache().clear();
    session.shutdown().await;
    drop(session);

    let reopened = Session::connect(config(&server, &data_dir)).unwrap();
    assert_eq!(reopened.cache().access_token(), None);
    assert_eq!(reopened.cache().user_id(), None);
}
