use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::Value as JsonValue;

use crate::activity;
use crate::db;
use crate::http::cors;
use crate::http::error::ApiError;
use crate::http::types::{AppState, ResourceQuery};

const METHODS: &str = "GET, OPTIONS";

pub fn router() -> Router<AppState> {
    cors::with_headers(
        Router::new().route(
            "/activity",
            get(list_activity)
                .options(cors::preflight)
                .fallback(cors::method_not_allowed),
        ),
        METHODS,
    )
}

async fn list_activity(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let limit = match q.limit.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => state.limits.default_limit,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n > 0 => n.min(state.limits.max_limit),
            _ => return Err(ApiError::bad_request("limit must be a positive integer")),
        },
    };

    let conn = state.db.lock().await;
    let rows = match activity::list(&conn, limit) {
        Ok(rows) => rows,
        Err(e) if db::is_missing_table(&e) => {
            tracing::warn!("activity_log table missing; returning empty list");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(JsonValue::Array(
        rows.into_iter().map(JsonValue::Object).collect(),
    )))
}
