use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::activity::ActivityEntry;
use crate::db::{self, Record};
use crate::http::cors;
use crate::http::error::ApiError;
use crate::http::fields::{self, flag, int, list, required, text, Assignments, Column};
use crate::http::types::{AppState, Payload, ResourceQuery};

/// Values the legacy single-assignee column accepts.
pub const LEGACY_ASSIGNEES: [&str; 2] = ["rishabh", "tung"];

const METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const UNKNOWN_TASK: &str = "Unknown task";
const UNKNOWN_USER: &str = "Unknown";

const COLUMNS: &[Column] = &[
    required("title"),
    text("notes"),
    int("week_id"),
    required("priority"),
    text("due_date"),
    flag("completed"),
    text("completed_at"),
    flag("is_default"),
    list("subtasks"),
    text("interview_id"),
    int("teacher_id"),
    list("assignees"),
    text("last_modified_by"),
];

const SELECT: &str = "SELECT id, title, notes, week_id, priority, due_date, completed, completed_at,
        created_at, is_default, subtasks, interview_id, teacher_id, assignee, assignees,
        last_modified_by
    FROM tasks";

pub fn router() -> Router<AppState> {
    cors::with_headers(
        Router::new().route(
            "/tasks",
            get(list_tasks)
                .post(create_task)
                .put(update_task)
                .delete(delete_task)
                .options(cors::preflight)
                .fallback(cors::method_not_allowed),
        ),
        METHODS,
    )
}

fn is_legacy_assignee(name: &str) -> bool {
    LEGACY_ASSIGNEES.contains(&name)
}

/// The legacy column mirrors the first list entry when it is one of
/// [`LEGACY_ASSIGNEES`], and is NULL otherwise.
pub fn derive_legacy_assignee(assignees: &[String]) -> Option<String> {
    assignees
        .first()
        .filter(|a| is_legacy_assignee(a))
        .cloned()
}

/// Resolves both assignee columns from a body. `None` when the body names
/// neither field. A non-empty `assignees` list wins over `assignee`.
fn resolve_assignees(body: &Record) -> Result<Option<(Vec<String>, Option<String>)>, ApiError> {
    let names = match body.get("assignees") {
        None => None,
        Some(JsonValue::Null) => Some(Vec::new()),
        Some(JsonValue::Array(items)) => Some(
            items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| ApiError::bad_request("assignees must be a list of names"))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(_) => return Err(ApiError::bad_request("assignees must be an array")),
    };
    let legacy = match body.get("assignee") {
        None => None,
        Some(JsonValue::Null) => Some(None),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Some(None),
        Some(JsonValue::String(s)) if is_legacy_assignee(s.trim()) => Some(Some(s.trim().to_string())),
        Some(_) => {
            return Err(ApiError::bad_request(format!(
                "assignee must be one of: {}",
                LEGACY_ASSIGNEES.join(", ")
            )))
        }
    };

    Ok(match (names, legacy) {
        (Some(names), _) if !names.is_empty() => {
            let legacy = derive_legacy_assignee(&names);
            Some((names, legacy))
        }
        (_, Some(Some(a))) => Some((vec![a.clone()], Some(a))),
        (Some(_), _) | (None, Some(None)) => Some((Vec::new(), None)),
        (None, None) => None,
    })
}

fn set_assignees(row: &mut Assignments, names: &[String], legacy: Option<String>) {
    row.set("assignees", SqlValue::Text(json!(names).to_string()));
    row.set("assignee", legacy.map(SqlValue::Text).unwrap_or(SqlValue::Null));
}

/// Who made the change, when the body says so.
fn actor_of(body: &Record) -> Option<String> {
    ["last_modified_by", "user"]
        .iter()
        .filter_map(|k| body.get(*k).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn truthy(v: &JsonValue) -> bool {
    v.as_bool()
        .or_else(|| v.as_i64().map(|n| n != 0))
        .unwrap_or(false)
}

fn read_task(conn: &Connection, id: &str) -> Result<Option<Record>, ApiError> {
    let rec = match db::query_record(conn, &format!("{SELECT} WHERE id = ?"), [id]) {
        Ok(rec) => rec,
        Err(e) if db::is_missing_table(&e) => None,
        Err(e) => return Err(e.into()),
    };
    Ok(rec.map(|mut r| {
        fields::decode_record(&mut r, COLUMNS);
        r
    }))
}

async fn list_tasks(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let conn = state.db.lock().await;
    if let Some(id) = q.id() {
        return match read_task(&conn, id)? {
            Some(rec) => Ok(Json(JsonValue::Object(rec))),
            None => Err(ApiError::not_found("Task not found")),
        };
    }

    let rows = match db::query_records(
        &conn,
        &format!("{SELECT} ORDER BY created_at DESC, rowid DESC"),
        [],
    ) {
        Ok(rows) => rows,
        Err(e) if db::is_missing_table(&e) => {
            tracing::warn!("tasks table missing; returning empty list");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    let tasks: Vec<JsonValue> = rows
        .into_iter()
        .map(|mut r| {
            fields::decode_record(&mut r, COLUMNS);
            JsonValue::Object(r)
        })
        .collect();
    Ok(Json(JsonValue::Array(tasks)))
}

async fn create_task(
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
    match body.get("created_at").and_then(|v| v.as_str()) {
        Some(ts) if !ts.trim().is_empty() => row.set("created_at", SqlValue::Text(ts.trim().to_string())),
        _ => row.set("created_at", SqlValue::Text(now.clone())),
    }
    row.set_default("subtasks", SqlValue::Text("[]".to_string()));
    if body.get("completed").map(truthy).unwrap_or(false) {
        row.set_default("completed_at", SqlValue::Text(now));
    }
    let (assignees, legacy) = resolve_assignees(&body)?.unwrap_or_default();
    set_assignees(&mut row, &assignees, legacy);

    let actor = actor_of(&body);
    if let Some(actor) = &actor {
        row.set_default("last_modified_by", SqlValue::Text(actor.clone()));
    }

    let sql = row.insert_sql("tasks");
    {
        let conn = state.db.lock().await;
        conn.execute(&sql, params_from_iter(row.into_values()))?;
    }

    let title = body
        .get("title")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or(UNKNOWN_TASK);
    state.activity.record(
        ActivityEntry::new("create", "task", actor.as_deref().unwrap_or(UNKNOWN_USER))
            .entity(&id, title)
            .details(json!({
                "priority": body.get("priority").cloned().unwrap_or(JsonValue::Null),
                "week_id": body.get("week_id").cloned().unwrap_or(JsonValue::Null),
                "assignees": assignees,
            })),
    );

    Ok(Json(json!({ "success": true, "id": id })))
}

async fn update_task(
    State(state): State<AppState>,
    q: ResourceQuery,
    Payload(body): Payload,
) -> Result<Json<JsonValue>, ApiError> {
    let id = q
        .id()
        .map(str::to_string)
        .or_else(|| body.get("id").and_then(fields::id_of))
        .ok_or_else(|| ApiError::bad_request("Missing id"))?;

    let mut row = Assignments::from_body(&body, COLUMNS)?;
    if let Some((assignees, legacy)) = resolve_assignees(&body)? {
        set_assignees(&mut row, &assignees, legacy);
    }
    if let Some(completed) = body.get("completed") {
        if truthy(completed) {
            row.set_default("completed_at", SqlValue::Text(db::now_ts()));
        } else {
            row.set_default("completed_at", SqlValue::Null);
        }
    }
    if row.is_empty() {
        return Ok(Json(json!({ "success": true, "id": id })));
    }

    let sql = row.update_sql("tasks", "id");
    let mut values = row.into_values();
    values.push(SqlValue::Text(id.clone()));
    let changed = {
        let conn = state.db.lock().await;
        conn.execute(&sql, params_from_iter(values))?
    };
    if changed == 0 {
        return Err(ApiError::not_found("Task not found"));
    }
    Ok(Json(json!({ "success": true, "id": id })))
}

async fn delete_task(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let id = q.require_id()?.to_string();
    let actor = q
        .user
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_USER)
        .to_string();

    let title = {
        let conn = state.db.lock().await;
        // Best effort: the title only labels the activity entry.
        let title = match conn
            .query_row("SELECT title FROM tasks WHERE id = ?", [&id], |r| {
                r.get::<_, String>(0)
            })
            .optional()
        {
            Ok(Some(t)) => t,
            Ok(None) => UNKNOWN_TASK.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, task_id = %id, "could not read task title before delete");
                UNKNOWN_TASK.to_string()
            }
        };
        conn.execute("DELETE FROM tasks WHERE id = ?", [&id])?;
        title
    };

    state
        .activity
        .record(ActivityEntry::new("delete", "task", &actor).entity(&id, &title));

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(v: JsonValue) -> Record {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn first_listed_assignee_becomes_legacy_value() {
        let resolved = resolve_assignees(&body(json!({ "assignees": ["rishabh", "tung"] })))
            .expect("resolve")
            .expect("present");
        assert_eq!(resolved.0, vec!["rishabh".to_string(), "tung".to_string()]);
        assert_eq!(resolved.1.as_deref(), Some("rishabh"));
    }

    #[test]
    fn unknown_first_assignee_leaves_legacy_null() {
        let resolved = resolve_assignees(&body(json!({ "assignees": ["maria", "tung"] })))
            .expect("resolve")
            .expect("present");
        assert_eq!(resolved.0.len(), 2);
        assert_eq!(resolved.1, None);
    }

    #[test]
    fn legacy_only_body_seeds_the_list() {
        let resolved = resolve_assignees(&body(json!({ "assignee": "tung" })))
            .expect("resolve")
            .expect("present");
        assert_eq!(resolved, (vec!["tung".to_string()], Some("tung".to_string())));
    }

    #[test]
    fn legacy_value_outside_fixed_set_is_rejected() {
        assert!(resolve_assignees(&body(json!({ "assignee": "maria" }))).is_err());
    }

    #[test]
    fn bodies_without_assignee_fields_leave_columns_alone() {
        assert_eq!(resolve_assignees(&body(json!({ "title": "x" }))).expect("resolve"), None);
    }
}
