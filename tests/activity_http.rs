use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use outreachd::config::ActivityConfig;
use outreachd::{db, http};
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;
use tower::ServiceExt;

fn setup() -> (TempDir, Router, http::AppState) {
    let dir = TempDir::new().expect("temp dir");
    let conn = db::open_db(&dir.path().join("outreach.sqlite3"), true).expect("open db");
    let limits = ActivityConfig {
        default_limit: 2,
        max_limit: 3,
    };
    let state = http::AppState::with_activity_writer(conn, limits);
    (dir, http::router(state.clone()), state)
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

async fn wait_for_entries(app: &Router, uri: &str, count: usize) -> JsonValue {
    for _ in 0..100 {
        let (status, body) = call(app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        if body.as_array().map_or(0, Vec::len) >= count {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("activity log never reached {count} entries");
}

async fn create_task(app: &Router, id: &str, title: &str) {
    let (status, _) = call(
        app,
        "POST",
        "/api/tasks",
        Some(json!({
            "id": id,
            "title": title,
            "priority": "high",
            "weekId": 1,
            "assignees": ["tung"],
            "lastModifiedBy": "tung",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn task_writes_reach_the_log_newest_first() {
    let (_dir, app, _state) = setup();
    create_task(&app, "t-1", "Email principals").await;
    call(&app, "DELETE", "/api/tasks?id=t-1&user=rishabh", None).await;

    let log = wait_for_entries(&app, "/api/activity", 2).await;
    assert_eq!(log[0]["action"], json!("delete"));
    assert_eq!(log[0]["user_name"], json!("rishabh"));
    assert_eq!(log[0]["entity_name"], json!("Email principals"));
    assert_eq!(log[1]["action"], json!("create"));
    assert_eq!(log[1]["entity_type"], json!("task"));
    assert_eq!(log[1]["entity_id"], json!("t-1"));
    assert_eq!(log[1]["user_name"], json!("tung"));
    assert_eq!(log[1]["details"]["priority"], json!("high"));
    assert_eq!(log[1]["details"]["assignees"], json!(["tung"]));
}

#[tokio::test]
async fn limit_defaults_and_clamps() {
    let (_dir, app, _state) = setup();
    for i in 0..4 {
        create_task(&app, &format!("t-{i}"), "Task").await;
    }
    wait_for_entries(&app, "/api/activity?limit=10", 3).await;

    let (_, log) = call(&app, "GET", "/api/activity", None).await;
    assert_eq!(log.as_array().map(Vec::len), Some(2));
    let (_, log) = call(&app, "GET", "/api/activity?limit=10", None).await;
    assert_eq!(log.as_array().map(Vec::len), Some(3));
    let (_, log) = call(&app, "GET", "/api/activity?limit=1", None).await;
    assert_eq!(log.as_array().map(Vec::len), Some(1));

    for bad in ["0", "-3", "lots"] {
        let (status, _) = call(&app, "GET", &format!("/api/activity?limit={bad}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "limit={bad}");
    }
}

#[tokio::test]
async fn primary_write_survives_a_broken_log() {
    let (_dir, app, state) = setup();
    state
        .db
        .lock()
        .await
        .execute("DROP TABLE activity_log", [])
        .expect("drop activity_log");

    create_task(&app, "t-1", "Email principals").await;
    let (status, task) = call(&app, "GET", "/api/tasks?id=t-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["title"], json!("Email principals"));

    let (status, log) = call(&app, "GET", "/api/activity", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log, json!([]));
}
