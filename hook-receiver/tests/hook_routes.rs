//! Integration tests for the HTTP surface.
//!
//! Tests: liveness, method and secret checks, payload logging, body read
//! failures, sink failure

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, Method, Request, StatusCode},
    Router,
};
use futures::stream;
use tower::ServiceExt;

use hookd::{router, AppState, Config, Sink, SinkError};

const SECRET: &str = "s3cret";

/// Sink that keeps every entry in memory.
#[derive(Clone, Default)]
struct MemorySink(Arc<Mutex<Vec<String>>>);

impl MemorySink {
    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Sink for MemorySink {
    fn write(&self, line: &[u8]) -> Result<(), SinkError> {
        self.0
            .lock()
            .unwrap()
            .push(String::from_utf8(line.to_vec()).unwrap());
        Ok(())
    }
}

struct FailingSink;

impl Sink for FailingSink {
    fn write(&self, _line: &[u8]) -> Result<(), SinkError> {
        Err(SinkError::Write(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}

fn config(vars: &[(&str, &str)]) -> Config {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|name| map.get(name).cloned()).unwrap()
}

fn test_app(vars: &[(&str, &str)]) -> (Router, MemorySink) {
    let sink = MemorySink::default();
    let state = AppState::new(config(vars), Arc::new(sink.clone()));
    (router(state), sink)
}

fn hook_request(method: Method, secret: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/api/hook");
    if let Some(secret) = secret {
        builder = builder.header(header::AUTHORIZATION, secret);
    }
    builder.body(body.into()).unwrap()
}

async fn response_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_healthz_any_method() {
    for method in [Method::GET, Method::POST, Method::DELETE] {
        let (app, sink) = test_app(&[("SHARED_SECRET", SECRET)]);

        let request = Request::builder()
            .method(method)
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_text(response).await, "ok");
        assert!(sink.entries().is_empty());
    }
}

#[tokio::test]
async fn test_hook_accepts_matching_secret() {
    let (app, sink) = test_app(&[("SHARED_SECRET", SECRET)]);

    let response = app
        .oneshot(hook_request(Method::POST, Some(SECRET), "deploy-finished"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "ok");

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].contains("msg=deploy-finished"));
    assert!(entries[0].contains("level=info"));
}

#[tokio::test]
async fn test_hook_rejects_other_methods() {
    for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
        let (app, sink) = test_app(&[("SHARED_SECRET", SECRET)]);

        let response = app
            .oneshot(hook_request(method, Some(SECRET), "payload"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response_text(response).await, "Method not allowed\n");
        assert!(sink.entries().is_empty());
    }
}

#[tokio::test]
async fn test_hook_rejects_wrong_secret() {
    for provided in [Some("wrong"), Some("s3cret "), Some(""), None] {
        let (app, sink) = test_app(&[("SHARED_SECRET", SECRET)]);

        let response = app
            .oneshot(hook_request(Method::POST, provided, "payload"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response_text(response).await, "Unauthorized\n");
        assert!(sink.entries().is_empty());
    }
}

#[tokio::test]
async fn test_hook_rejects_non_utf8_header() {
    let (app, sink) = test_app(&[("SHARED_SECRET", SECRET)]);

    let mut request = hook_request(Method::POST, None, "payload");
    request.headers_mut().insert(
        header::AUTHORIZATION,
        HeaderValue::from_bytes(b"s3c\xffret").unwrap(),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn test_empty_secret_accepts_missing_header() {
    let (app, sink) = test_app(&[]);

    let response = app
        .oneshot(hook_request(Method::POST, None, "open"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sink.entries().len(), 1);

    let (app, sink) = test_app(&[]);
    let response = app
        .oneshot(hook_request(Method::POST, Some("anything"), "open"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn test_json_formatter_keeps_payload() {
    let (app, sink) = test_app(&[("SHARED_SECRET", SECRET), ("FORMATTER", "json")]);
    let payload = "{\"event\":\"push\",\"ref\":\"refs/heads/main\"}\n";

    let response = app
        .oneshot(hook_request(Method::POST, Some(SECRET), payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ends_with('\n'));

    let value: serde_json::Value = serde_json::from_str(entries[0].trim_end()).unwrap();
    assert_eq!(value["msg"], payload);
    assert_eq!(value["level"], "info");
    assert!(value["time"].is_string());
}

#[tokio::test]
async fn test_large_body_is_logged_intact() {
    let (app, sink) = test_app(&[("SHARED_SECRET", SECRET), ("FORMATTER", "json")]);
    let payload = "z".repeat(3 * 1024 * 1024);

    let response = app
        .oneshot(hook_request(Method::POST, Some(SECRET), payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "ok");

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    let value: serde_json::Value = serde_json::from_str(entries[0].trim_end()).unwrap();
    assert_eq!(value["msg"], payload.as_str());
    assert!(value.get("read_error").is_none());
}

#[tokio::test]
async fn test_body_read_error_still_answers_ok() {
    let (app, sink) = test_app(&[("SHARED_SECRET", SECRET), ("FORMATTER", "json")]);

    let chunks: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(b"partial")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
    ];
    let body = Body::from_stream(stream::iter(chunks));

    let response = app
        .oneshot(hook_request(Method::POST, Some(SECRET), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_text(response).await, "ok");

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    let value: serde_json::Value = serde_json::from_str(entries[0].trim_end()).unwrap();
    assert_eq!(value["msg"], "");
    assert!(!value["read_error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_body_is_logged() {
    let (app, sink) = test_app(&[("SHARED_SECRET", SECRET)]);

    let response = app
        .oneshot(hook_request(Method::POST, Some(SECRET), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ends_with(" level=info msg=\"\"\n"));
    assert!(!entries[0].contains("read_error"));
}

#[tokio::test]
async fn test_non_utf8_body_is_logged_lossy() {
    let (app, sink) = test_app(&[("SHARED_SECRET", SECRET), ("FORMATTER", "json")]);

    let response = app
        .oneshot(hook_request(
            Method::POST,
            Some(SECRET),
            vec![b'o', b'k', 0xff, b'!'],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    let value: serde_json::Value = serde_json::from_str(entries[0].trim_end()).unwrap();
    assert_eq!(value["msg"], "ok\u{fffd}!");
}

#[tokio::test]
async fn test_sink_failure_is_fatal() {
    let state = AppState::new(config(&[("SHARED_SECRET", SECRET)]), Arc::new(FailingSink));
    let app = router(state.clone());

    let response = app
        .oneshot(hook_request(Method::POST, Some(SECRET), "payload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    tokio::time::timeout(Duration::from_secs(1), state.fatal_error())
        .await
        .expect("fatal error should be signalled");
}
