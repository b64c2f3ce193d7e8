use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::db::{self, Record};
use crate::http::cors;
use crate::http::error::ApiError;
use crate::http::fields::{self, int, required, text, Assignments, Column};
use crate::http::types::{AppState, Payload, ResourceQuery};

const METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

const CARD_COLUMNS: &[Column] = &[required("title"), text("description"), int("sort_order")];

const ITEM_COLUMNS: &[Column] = &[
    required("card_id"),
    required("type"),
    required("title"),
    text("url"),
    text("content"),
    int("sort_order"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entity {
    Card,
    Item,
}

impl Entity {
    fn parse(raw: &str) -> Result<Self, ApiError> {
        match raw.trim() {
            "card" => Ok(Entity::Card),
            "item" => Ok(Entity::Item),
            other => Err(ApiError::bad_request(format!(
                "entityType must be 'card' or 'item', got '{other}'"
            ))),
        }
    }

    /// Query parameter first, then the body's `entity_type`.
    fn from_request(q: &ResourceQuery, body: Option<&Record>) -> Result<Self, ApiError> {
        let raw = q
            .entity_type
            .as_deref()
            .or_else(|| body.and_then(|b| b.get("entity_type")).and_then(|v| v.as_str()))
            .ok_or_else(|| ApiError::MissingFields(vec!["entity_type".to_string()]))?;
        Self::parse(raw)
    }

    fn table(self) -> &'static str {
        match self {
            Entity::Card => "knowledge_cards",
            Entity::Item => "knowledge_items",
        }
    }

    fn columns(self) -> &'static [Column] {
        match self {
            Entity::Card => CARD_COLUMNS,
            Entity::Item => ITEM_COLUMNS,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Entity::Card => "Knowledge card",
            Entity::Item => "Knowledge item",
        }
    }
}

pub fn router() -> Router<AppState> {
    cors::with_headers(
        Router::new().route(
            "/knowledge",
            get(list_knowledge)
                .post(create_entry)
                .put(update_entry)
                .delete(delete_entry)
                .options(cors::preflight)
                .fallback(cors::method_not_allowed),
        ),
        METHODS,
    )
}

fn load_items(conn: &Connection) -> rusqlite::Result<Vec<Record>> {
    db::query_records(
        conn,
        "SELECT id, card_id, type, title, url, content, sort_order, created_at, updated_at
         FROM knowledge_items
         ORDER BY card_id, sort_order, created_at",
        [],
    )
}

/// Cards in display order, each carrying its items under `items`.
fn load_cards(conn: &Connection) -> rusqlite::Result<Vec<Record>> {
    let mut cards = db::query_records(
        conn,
        "SELECT id, title, description, sort_order, created_at, updated_at
         FROM knowledge_cards
         ORDER BY sort_order, created_at",
        [],
    )?;
    let items = load_items(conn)?;
    for card in cards.iter_mut() {
        let card_id = card.get("id").cloned().unwrap_or(JsonValue::Null);
        let children: Vec<JsonValue> = items
            .iter()
            .filter(|item| item.get("card_id") == Some(&card_id))
            .cloned()
            .map(JsonValue::Object)
            .collect();
        card.insert("items".to_string(), JsonValue::Array(children));
    }
    Ok(cards)
}

async fn list_knowledge(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let entity = match q.entity_type.as_deref() {
        Some(raw) => Entity::parse(raw)?,
        None => Entity::Card,
    };
    let conn = state.db.lock().await;
    let rows = match entity {
        Entity::Card => load_cards(&conn),
        Entity::Item => load_items(&conn),
    };
    let rows = match rows {
        Ok(rows) => rows,
        Err(e) if db::is_missing_table(&e) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if let Some(id) = q.id() {
        return rows
            .into_iter()
            .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
            .map(|r| Json(JsonValue::Object(r)))
            .ok_or_else(|| ApiError::not_found(format!("{} not found", entity.label())));
    }
    Ok(Json(JsonValue::Array(
        rows.into_iter().map(JsonValue::Object).collect(),
    )))
}

fn next_sort_order(conn: &Connection, entity: Entity, card_id: Option<&str>) -> rusqlite::Result<i64> {
    match entity {
        Entity::Card => conn.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM knowledge_cards",
            [],
            |r| r.get(0),
        ),
        Entity::Item => conn.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM knowledge_items WHERE card_id = ?",
            [card_id.unwrap_or_default()],
            |r| r.get(0),
        ),
    }
}

fn card_exists(conn: &Connection, card_id: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM knowledge_cards WHERE id = ?", [card_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

async fn create_entry(
    State(state): State<AppState>,
    q: ResourceQuery,
    Payload(body): Payload,
) -> Result<Json<JsonValue>, ApiError> {
    let entity = Entity::from_request(&q, Some(&body))?;
    fields::check_required(&body, entity.columns())?;
    let mut row = Assignments::from_body(&body, entity.columns())?;

    let id = body
        .get("id")
        .and_then(fields::id_of)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = db::now_ts();
    row.set("id", SqlValue::Text(id.clone()));
    row.set("created_at", SqlValue::Text(now.clone()));
    row.set("updated_at", SqlValue::Text(now));

    let card_id = body.get("card_id").and_then(|v| v.as_str()).map(str::trim);
    let conn = state.db.lock().await;
    if let (Entity::Item, Some(card_id)) = (entity, card_id) {
        if !card_exists(&conn, card_id)? {
            return Err(ApiError::not_found("Knowledge card not found"));
        }
    }
    if !row.contains("sort_order") || body.get("sort_order").map_or(false, JsonValue::is_null) {
        row.set(
            "sort_order",
            SqlValue::Integer(next_sort_order(&conn, entity, card_id)?),
        );
    }

    let sql = row.insert_sql(entity.table());
    conn.execute(&sql, params_from_iter(row.into_values()))?;
    Ok(Json(json!({ "success": true, "id": id })))
}

async fn update_entry(
    State(state): State<AppState>,
    q: ResourceQuery,
    Payload(body): Payload,
) -> Result<Json<JsonValue>, ApiError> {
    let id = q.require_id()?.to_string();
    let entity = Entity::from_request(&q, Some(&body))?;
    let mut row = Assignments::from_body(&body, entity.columns())?;
    if row.is_empty() {
        return Ok(Json(json!({ "success": true })));
    }
    row.set("updated_at", SqlValue::Text(db::now_ts()));

    let sql = row.update_sql(entity.table(), "id");
    let mut values = row.into_values();
    values.push(SqlValue::Text(id));
    let changed = {
        let conn = state.db.lock().await;
        conn.execute(&sql, params_from_iter(values))?
    };
    if changed == 0 {
        return Err(ApiError::not_found(format!("{} not found", entity.label())));
    }
    Ok(Json(json!({ "success": true })))
}

async fn delete_entry(
    State(state): State<AppState>,
    q: ResourceQuery,
) -> Result<Json<JsonValue>, ApiError> {
    let id = q.require_id()?.to_string();
    let entity = Entity::from_request(&q, None)?;
    let conn = state.db.lock().await;
    match entity {
        Entity::Item => {
            conn.execute("DELETE FROM knowledge_items WHERE id = ?", [&id])?;
        }
        Entity::Card => {
            // Items reference their card without ON DELETE CASCADE.
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM knowledge_items WHERE card_id = ?", [&id])?;
            tx.execute("DELETE FROM knowledge_cards WHERE id = ?", [&id])?;
            tx.commit()?;
        }
    }
    Ok(Json(json!({ "success": true })))
}
