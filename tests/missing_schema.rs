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
    let conn = db::open_db(&dir.path().join("outreach.sqlite3"), false).expect("open db");
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
async fn reads_degrade_to_empty_without_tables() {
    let (_dir, app) = setup();
    for uri in [
        "/api/tasks",
        "/api/teachers",
        "/api/interviews",
        "/api/knowledge",
        "/api/knowledge?entityType=item",
        "/api/activity",
    ] {
        let (status, body) = call(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, json!([]), "{uri}");
    }
}

#[tokio::test]
async fn goals_fall_back_to_defaults_without_table() {
    let (_dir, app) = setup();
    let (status, goals) = call(&app, "GET", "/api/goals", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(goals["target_interviews"], json!(30));
    assert_eq!(goals["price_point"], json!(99.0));
}

#[tokio::test]
async fn single_record_reads_are_not_found_without_tables() {
    let (_dir, app) = setup();
    let (status, _) = call(&app, "GET", "/api/tasks?id=t-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "GET", "/api/teachers?id=1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn writes_report_unprovisioned_storage() {
    let (_dir, app) = setup();
    let (status, body) = call(
        &app,
        "POST",
        "/api/tasks",
        Some(json!({ "title": "Email principals", "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], json!("Storage is not provisioned"));

    let (status, _) = call(&app, "PUT", "/api/goals", Some(json!({ "targetPilots": 3 }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn validation_still_runs_before_storage() {
    let (_dir, app) = setup();
    let (status, body) = call(&app, "POST", "/api/teachers", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["name", "school", "school_type", "status"]));
}
