use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use rusqlite::{params_from_iter, types::Value as SqlValue};
use serde_json::{json, Value as JsonValue};

use crate::db;
use crate::http::cors;
use crate::http::error::ApiError;
use crate::http::fields::{self, flag, required, text, Assignments, Column};
use crate::http::types::{AppState, Payload, ResourceQuery};

const METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

const COLUMNS: &[Column] = &[
    required("name"),
    text("designation"),
    text("department"),
    required("school"),
    required("school_type"),
    text("email"),
    text("phone"),
    text("linkedin_url"),
    text("email_sent_date"),
    text("linkedin_request_date"),
    text("linkedin_accepted_date"),
    text("call_date"),
    text("follow_up_date"),
    text("last_contacted_date"),
    required("status"),
    text("notes"),
    flag("via_email"),
    flag("via_linkedin"),
    flag("via_call"),
    flag("via_referral"),
];

pub fn router() -> Router<AppState> {
    cors::with_headers(
        Router::new().route(
            "/teachers",
            get(list_teachers)
                .post(create_teacher)
                .put(update_teacher)
                .delete(delete_teacher)
                .options(cors::preflight)
                .fallback(cors::method_not_allowed),
        ),
        METHODS,
    )
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::bad_request("id must be an integer"))
}

async fn list_teachers(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let conn = state.db.lock().await;
    if let Some(raw) = q.id() {
        let id = parse_id(raw)?;
        let rec = match db::query_record(&conn, "SELECT * FROM teachers WHERE id = ?", [id]) {
            Ok(rec) => rec,
            Err(e) if db::is_missing_table(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(mut rec) = rec else {
            return Err(ApiError::not_found("Teacher not found"));
        };
        fields::decode_record(&mut rec, COLUMNS);
        return Ok(Json(JsonValue::Object(rec)));
    }

    let rows = match db::query_records(&conn, "SELECT * FROM teachers ORDER BY name, id", []) {
        Ok(rows) => rows,
        Err(e) if db::is_missing_table(&e) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let teachers: Vec<JsonValue> = rows
        .into_iter()
        .map(|mut r| {
            fields::decode_record(&mut r, COLUMNS);
            JsonValue::Object(r)
        })
        .collect();
    Ok(Json(JsonValue::Array(teachers)))
}

async fn create_teacher(
    State(state): State<AppState>,
    Payload(body): Payload,
) -> Result<Json<JsonValue>, ApiError> {
    fields::check_required(&body, COLUMNS)?;
    let mut row = Assignments::from_body(&body, COLUMNS)?;
    let now = db::now_ts();
    row.set("created_at", SqlValue::Text(now.clone()));
    row.set("updated_at", SqlValue::Text(now));

    let sql = row.insert_sql("teachers");
    let id = {
        let conn = state.db.lock().await;
        conn.execute(&sql, params_from_iter(row.into_values()))?;
        conn.last_insert_rowid()
    };
    tracing::info!(teacher_id = id, "teacher created");
    Ok(Json(json!({ "success": true, "id": id })))
}

async fn update_teacher(
    State(state): State<AppState>,
    q: ResourceQuery,
    Payload(body): Payload,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_id(q.require_id()?)?;
    let mut row = Assignments::from_body(&body, COLUMNS)?;
    if row.is_empty() {
        return Ok(Json(json!({ "success": true })));
    }
    row.set("updated_at", SqlValue::Text(db::now_ts()));

    let sql = row.update_sql("teachers", "id");
    let mut values = row.into_values();
    values.push(SqlValue::Integer(id));
    let changed = {
        let conn = state.db.lock().await;
        conn.execute(&sql, params_from_iter(values))?
    };
    if changed == 0 {
        return Err(ApiError::not_found("Teacher not found"));
    }
    Ok(Json(json!({ "success": true })))
}

async fn delete_teacher(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let id = parse_id(q.require_id()?)?;
    let conn = state.db.lock().await;
    conn.execute("DELETE FROM teachers WHERE id = ?", [id])?;
    Ok(Json(json!({ "success": true })))
}
