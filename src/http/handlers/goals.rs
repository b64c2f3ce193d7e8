use axum::{extract::State, routing::get, Json, Router};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection};
use serde_json::{json, Value as JsonValue};

use crate::db::{self, Record};
use crate::http::cors;
use crate::http::error::ApiError;
use crate::http::fields::{self, int, real, Column, Kind};
use crate::http::types::{AppState, Payload};

const METHODS: &str = "GET, PUT, OPTIONS";

/// The goals table holds exactly one row under this key.
pub const GOALS_ID: i64 = 1;

const COLUMNS: &[Column] = &[
    int("target_interviews"),
    int("target_high_scores"),
    int("target_pilots"),
    int("target_setup_time"),
    real("price_point"),
];

/// Used for any target that has never been set.
const DEFAULTS: [(&str, f64); 5] = [
    ("target_interviews", 30.0),
    ("target_high_scores", 15.0),
    ("target_pilots", 5.0),
    ("target_setup_time", 10.0),
    ("price_point", 99.0),
];

pub fn router() -> Router<AppState> {
    cors::with_headers(
        Router::new().route(
            "/goals",
            get(get_goals)
                .put(update_goals)
                .options(cors::preflight)
                .fallback(cors::method_not_allowed),
        ),
        METHODS,
    )
}

fn default_goals() -> Record {
    let mut rec = Record::new();
    rec.insert("id".to_string(), json!(GOALS_ID));
    for (column, (name, value)) in COLUMNS.iter().zip(DEFAULTS) {
        debug_assert_eq!(column.name, name);
        let v = match column.kind {
            Kind::Integer => json!(value as i64),
            _ => json!(value),
        };
        rec.insert(name.to_string(), v);
    }
    rec.insert("updated_at".to_string(), JsonValue::Null);
    rec
}

fn read_goals(conn: &Connection) -> Result<Record, ApiError> {
    match db::query_record(
        conn,
        "SELECT id, target_interviews, target_high_scores, target_pilots, target_setup_time,
                price_point, updated_at
         FROM goals WHERE id = ?",
        [GOALS_ID],
    ) {
        Ok(Some(rec)) => Ok(rec),
        Ok(None) => Ok(default_goals()),
        Err(e) if db::is_missing_table(&e) => Ok(default_goals()),
        Err(e) => Err(e.into()),
    }
}

async fn get_goals(State(state): State<AppState>) -> Result<Json<JsonValue>, ApiError> {
    let conn = state.db.lock().await;
    Ok(Json(JsonValue::Object(read_goals(&conn)?)))
}

/// One statement merges the supplied targets into the singleton row, creating it
/// from the defaults first if needed. Absent or null targets keep their value.
async fn update_goals(
    State(state): State<AppState>,
    Payload(body): Payload,
) -> Result<Json<JsonValue>, ApiError> {
    let mut values: Vec<SqlValue> = vec![SqlValue::Integer(GOALS_ID)];
    for column in COLUMNS {
        let v = match body.get(column.name) {
            Some(v) => fields::to_sql(column, v)?,
            None => SqlValue::Null,
        };
        values.push(v);
    }
    values.push(SqlValue::Text(db::now_ts()));

    let names: Vec<&str> = COLUMNS.iter().map(|c| c.name).collect();
    let inserts: Vec<String> = DEFAULTS
        .iter()
        .enumerate()
        .map(|(i, (_, default))| format!("COALESCE(?{}, {})", i + 2, default))
        .collect();
    let merges: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, n)| format!("{n} = COALESCE(?{}, goals.{n})", i + 2))
        .collect();
    let stamp = names.len() + 2;
    let sql = format!(
        "INSERT INTO goals(id, {}, updated_at) VALUES(?1, {}, ?{stamp})
         ON CONFLICT(id) DO UPDATE SET {}, updated_at = ?{stamp}",
        names.join(", "),
        inserts.join(", "),
        merges.join(", "),
    );

    let conn = state.db.lock().await;
    conn.execute(&sql, params_from_iter(values))?;
    Ok(Json(json!({ "success": true, "goals": JsonValue::Object(read_goals(&conn)?) })))
}
