//! End-to-end classification tests against a local mock HTTP server.

use mockito::Matcher;
use requeue::{Client, ErrorKind, Query, RequestOptions, ResponseData};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client(base_url: &str) -> Client {
    init_tracing();
    Client::builder()
        .base_url(base_url)
        .build()
        .expect("failed to build client")
}

#[tokio::test]
async fn test_get_json_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"a":1}"#)
        .create_async()
        .await;

    let response = client(&server.url())
        .get("/test", RequestOptions::new())
        .response()
        .await
        .expect("request failed");

    assert_eq!(response.status, 200);
    assert_eq!(response.data, ResponseData::Json(json!({"a": 1})));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_encodes_json_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/test")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Exact(r#"{"a":2}"#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"a":1}"#)
        .create_async()
        .await;

    let response = client(&server.url())
        .post(
            "/test",
            RequestOptions::new()
                .header("content-type", "application/json")
                .body(json!({"a": 2})),
        )
        .response()
        .await
        .expect("request failed");

    assert_eq!(response.data, ResponseData::Json(json!({"a": 1})));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_delete_sends_no_body_and_exposes_no_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/test/1")
        .with_status(200)
        .create_async()
        .await;

    let response = client(&server.url())
        .delete("/test/1", RequestOptions::new())
        .response()
        .await
        .expect("request failed");

    assert!(response.data.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_query_pairs_reach_the_wire_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/test")
        .match_query(Matcher::Exact("a=1&b=2".to_string()))
        .with_status(200)
        .create_async()
        .await;

    client(&server.url())
        .get(
            "/test",
            RequestOptions::new().query(Query::from(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ])),
        )
        .response()
        .await
        .expect("request failed");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_classification() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/test")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"field":"name"}"#)
        .create_async()
        .await;

    let err = client(&server.url())
        .get("/test", RequestOptions::new())
        .response()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::ClientInput));
    assert_eq!(err.status(), Some(400));
    match err {
        requeue::Error::Status(e) => assert_eq!(e.body, Some(json!({"field": "name"}))),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_server_error_classification() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/test")
        .with_status(500)
        .create_async()
        .await;

    let err = client(&server.url())
        .get("/test", RequestOptions::new())
        .response()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Server));
}

#[tokio::test]
async fn test_unexpected_status_classification() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/test")
        .with_status(600)
        .create_async()
        .await;

    let err = client(&server.url())
        .get("/test", RequestOptions::new())
        .response()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Unexpected));
    assert_eq!(err.status(), Some(600));
}

#[tokio::test]
async fn test_connection_failure_classification() {
    // Nothing listens on port 1; the dispatch opens but never connects.
    let err = client("http://127.0.0.1:1")
        .get("/test", RequestOptions::new())
        .response()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Connection));
    assert_eq!(err.status(), Some(0));
}

#[tokio::test]
async fn test_error_observer_fires_with_promise_outcome() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/test")
        .with_status(500)
        .create_async()
        .await;

    let observed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&observed);

    let err = client(&server.url())
        .get(
            "/test",
            RequestOptions::new().on_error(move |error| {
                assert_eq!(error.kind(), Some(ErrorKind::Server));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .response()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Server));
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_complete_observer_fires_with_promise_outcome() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let observed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&observed);

    let response = client(&server.url())
        .get(
            "/test",
            RequestOptions::new().on_complete(move |response| {
                assert_eq!(response.status, 200);
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .response()
        .await
        .expect("request failed");

    assert_eq!(response.data, ResponseData::Json(json!({"ok": true})));
    assert_eq!(observed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_response_transformer_reshapes_payload() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":{"a":1}}"#)
        .create_async()
        .await;

    let response = client(&server.url())
        .get(
            "/test",
            RequestOptions::new()
                .transform_response(|payload| payload["data"].clone()),
        )
        .response()
        .await
        .expect("request failed");

    assert_eq!(response.data, ResponseData::Json(json!({"a": 1})));
}

#[tokio::test]
async fn test_error_payload_transformer_applies_only_to_error_bodies() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/test")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"errors":{"field":"name"}}"#)
        .create_async()
        .await;

    // The success-response transform must not run over the error body.
    let err = client(&server.url())
        .get(
            "/test",
            RequestOptions::new()
                .transform_response(|payload| payload["data"].clone())
                .transform_error_response(|payload| payload["errors"].clone()),
        )
        .response()
        .await
        .unwrap_err();

    match err {
        requeue::Error::Status(e) => assert_eq!(e.body, Some(json!({"field": "name"}))),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_error_transformer_substitutes_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/test")
        .with_status(500)
        .create_async()
        .await;

    let err = client(&server.url())
        .get(
            "/test",
            RequestOptions::new().transform_error(|error| {
                anyhow::anyhow!("upstream rejected us with {}", error.status)
            }),
        )
        .response()
        .await
        .unwrap_err();

    match err {
        requeue::Error::Transformed(e) => {
            assert_eq!(e.to_string(), "upstream rejected us with 500");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_download_progress_reports_received_bytes() {
    let mut server = mockito::Server::new_async().await;
    let body = r#"{"payload":"0123456789"}"#;
    server
        .mock("GET", "/test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let last_seen = Arc::new(AtomicUsize::new(0));
    let progress = Arc::clone(&last_seen);

    client(&server.url())
        .get(
            "/test",
            RequestOptions::new().on_download_progress(move |p| {
                progress.store(p.bytes as usize, Ordering::SeqCst);
            }),
        )
        .response()
        .await
        .expect("request failed");

    assert_eq!(last_seen.load(Ordering::SeqCst), body.len());
}
