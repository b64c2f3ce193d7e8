use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use rusqlite::{params_from_iter, types::Value as SqlValue};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::db;
use crate::http::cors;
use crate::http::error::ApiError;
use crate::http::fields::{self, flag, int, real, required, text, Assignments, Column};
use crate::http::types::{AppState, Payload, ResourceQuery};

const METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

const COLUMNS: &[Column] = &[
    int("teacher_id"),
    required("teacher_name"),
    text("school"),
    required("interview_date"),
    text("status"),
    int("score"),
    flag("pilot_interest"),
    int("setup_time"),
    real("price_feedback"),
    text("notes"),
];

pub fn router() -> Router<AppState> {
    cors::with_headers(
        Router::new().route(
            "/interviews",
            get(list_interviews)
                .post(create_interview)
                .put(update_interview)
                .delete(delete_interview)
                .options(cors::preflight)
                .fallback(cors::method_not_allowed),
        ),
        METHODS,
    )
}

async fn list_interviews(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let conn = state.db.lock().await;
    if let Some(id) = q.id() {
        let rec = match db::query_record(&conn, "SELECT * FROM interviews WHERE id = ?", [id]) {
            Ok(rec) => rec,
            Err(e) if db::is_missing_table(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(mut rec) = rec else {
            return Err(ApiError::not_found("Interview not found"));
        };
        fields::decode_record(&mut rec, COLUMNS);
        return Ok(Json(JsonValue::Object(rec)));
    }

    let rows = match db::query_records(
        &conn,
        "SELECT * FROM interviews ORDER BY interview_date DESC, created_at DESC",
        [],
    ) {
        Ok(rows) => rows,
        Err(e) if db::is_missing_table(&e) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let interviews: Vec<JsonValue> = rows
        .into_iter()
        .map(|mut r| {
            fields::decode_record(&mut r, COLUMNS);
            JsonValue::Object(r)
        })
        .collect();
    Ok(Json(JsonValue::Array(interviews)))
}

async fn create_interview(
    State(state): State<AppState>,
    Payload(body): Payload,
) -> Result<Json<JsonValue>, ApiError> {
    fields::check_required(&body, COLUMNS)?;
    let mut row = Assignments::from_body(&body, COLUMNS)?;
    let id = body
        .get("id")
        .and_then(fields::id_of)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = db::now_ts();
    row.set("id", SqlValue::Text(id.clone()));
    row.set_default("status", SqlValue::Text("scheduled".to_string()));
    row.set("created_at", SqlValue::Text(now.clone()));
    row.set("updated_at", SqlValue::Text(now));

    let sql = row.insert_sql("interviews");
    {
        let conn = state.db.lock().await;
        conn.execute(&sql, params_from_iter(row.into_values()))?;
    }
    Ok(Json(json!({ "success": true, "id": id })))
}

async fn update_interview(
    State(state): State<AppState>,
    q: ResourceQuery,
    Payload(body): Payload,
) -> Result<Json<JsonValue>, ApiError> {
    let id = q.require_id()?.to_string();
    let mut row = Assignments::from_body(&body, COLUMNS)?;
    if row.is_empty() {
        return Ok(Json(json!({ "success": true })));
    }
    row.set("updated_at", SqlValue::Text(db::now_ts()));

    let sql = row.update_sql("interviews", "id");
    let mut values = row.into_values();
    values.push(SqlValue::Text(id));
    let changed = {
        let conn = state.db.lock().await;
        conn.execute(&sql, params_from_iter(values))?
    };
    if changed == 0 {
        return Err(ApiError::not_found("Interview not found"));
    }
    Ok(Json(json!({ "success": true })))
}

async fn delete_interview(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let id = q.require_id()?;
    let conn = state.db.lock().await;
    conn.execute("DELETE FROM interviews WHERE id = ?", [id])?;
    Ok(Json(json!({ "success": true })))
}
