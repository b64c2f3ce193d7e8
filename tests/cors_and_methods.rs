use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use outreachd::activity::{ActivityEntry, ActivitySink};
use outreachd::config::ActivityConfig;
use outreachd::{db, http};
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;
use tower::ServiceExt;

struct NullSink;

impl ActivitySink for NullSink {
    fn record(&self, _entry: ActivityEntry) {}
}

fn setup() -> (TempDir, Router) {
    let dir = TempDir::new().expect("temp dir");
    let conn = db::open_db(&dir.path().join("outreach.sqlite3"), true).expect("open db");
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

async fn raw(app: &Router, method: &str, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
}

fn header_str<'a>(resp: &'a axum::response::Response, name: header::HeaderName) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn preflight_answers_with_allow_lists() {
    let (_dir, app) = setup();
    let resp = raw(&app, "OPTIONS", "/api/tasks").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
    assert_eq!(
        header_str(&resp, header::ACCESS_CONTROL_ALLOW_METHODS),
        Some("GET, POST, PUT, DELETE, OPTIONS")
    );
    assert_eq!(header_str(&resp, header::ACCESS_CONTROL_ALLOW_HEADERS), Some("Content-Type"));

    let resp = raw(&app, "OPTIONS", "/api/goals").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::ACCESS_CONTROL_ALLOW_METHODS), Some("GET, PUT, OPTIONS"));
}

#[tokio::test]
async fn ordinary_responses_carry_cors_headers() {
    let (_dir, app) = setup();
    let resp = raw(&app, "GET", "/api/activity").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
    assert_eq!(header_str(&resp, header::ACCESS_CONTROL_ALLOW_METHODS), Some("GET, OPTIONS"));
}

#[tokio::test]
async fn unsupported_methods_get_json_405() {
    let (_dir, app) = setup();
    for (method, uri) in [
        ("PATCH", "/api/tasks"),
        ("DELETE", "/api/goals"),
        ("POST", "/api/activity"),
    ] {
        let (status, body) = call(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
        assert_eq!(body["error"], json!("Method not allowed"));
    }
}

#[tokio::test]
async fn unknown_paths_are_json_404_with_origin_header() {
    let (_dir, app) = setup();
    let resp = raw(&app, "GET", "/api/nothing-here").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(header_str(&resp, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let body: JsonValue = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["error"], json!("Not found"));
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, app) = setup();
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn malformed_query_string_is_a_json_400() {
    let (_dir, app) = setup();
    let resp = raw(&app, "GET", "/api/tasks?id=a&id=b").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header_str(&resp, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let body: JsonValue = serde_json::from_slice(&bytes).expect("json");
    assert!(body["error"].as_str().unwrap_or_default().contains("id"));

    let (status, body) = call(&app, "DELETE", "/api/teachers?id=1&id=2", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
