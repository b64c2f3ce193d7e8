use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use outreachd::activity::{ActivityEntry, ActivitySink};
use outreachd::config::ActivityConfig;
use outreachd::http::error::InternalFailure;
use outreachd::{db, http};
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;
use tower::ServiceExt;

struct NullSink;

impl ActivitySink for NullSink {
    fn record(&self, _entry: ActivityEntry) {}
}

/// A tasks table from an older layout, missing most columns and left as is.
fn setup() -> (TempDir, Router) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("outreach.sqlite3");
    rusqlite::Connection::open(&path)
        .and_then(|c| c.execute("CREATE TABLE tasks(id TEXT PRIMARY KEY, title TEXT)", []))
        .expect("seed tasks table");
    let conn = db::open_db(&path, false).expect("open db");
    let state = http::AppState::new(conn, Arc::new(NullSink), ActivityConfig::default());
    (dir, http::router(state))
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

#[tokio::test]
async fn storage_failures_get_an_error_id() {
    let (_dir, app) = setup();
    let (status, body) = call(&app, "GET", "/api/tasks", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Internal server error"));
    assert!(body["message"].as_str().unwrap_or_default().contains("no such column"));
    let error_id = body["errorId"].as_str().expect("errorId");
    assert!(uuid::Uuid::parse_str(error_id).is_ok());
}

#[tokio::test]
async fn failure_details_reach_the_logging_middleware() {
    let (_dir, app) = setup();
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/tasks?id=t-1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let failure = resp
        .extensions()
        .get::<InternalFailure>()
        .cloned()
        .expect("failure extension");

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let body: JsonValue = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["errorId"], json!(failure.error_id));
    assert_eq!(body["message"], json!(failure.message));
}

#[tokio::test]
async fn each_failure_gets_its_own_id() {
    let (_dir, app) = setup();
    let (_, first) = call(&app, "GET", "/api/tasks", None).await;
    let (_, second) = call(&app, "GET", "/api/tasks", None).await;
    assert_ne!(first["errorId"], second["errorId"]);
}
