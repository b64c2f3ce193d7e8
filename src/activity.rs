//! Activity log: an append-only audit trail fed through a fire-and-forget sink.
//!
//! Handlers hand entries to an [`ActivitySink`] after their primary write has
//! succeeded. The default sink forwards them over a channel to a background
//! writer, so a failed append is logged and dropped and never reaches the caller.

use std::sync::Arc;

use rusqlite::{params, Connection};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, Mutex};

use crate::db::{self, Record};

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub user_name: String,
    pub details: Option<JsonValue>,
}

impl ActivityEntry {
    pub fn new(action: &str, entity_type: &str, user_name: &str) -> Self {
        Self {
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: None,
            entity_name: None,
            user_name: user_name.to_string(),
            details: None,
        }
    }

    pub fn entity(mut self, id: &str, name: &str) -> Self {
        self.entity_id = Some(id.to_string());
        self.entity_name = Some(name.to_string());
        self
    }

    pub fn details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

/// Receives activity entries with no delivery guarantee.
pub trait ActivitySink: Send + Sync {
    fn record(&self, entry: ActivityEntry);
}

/// Sink backed by the background writer started with [`spawn_writer`].
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ActivityEntry>,
}

impl ActivitySink for ChannelSink {
    fn record(&self, entry: ActivityEntry) {
        if let Err(e) = self.tx.send(entry) {
            tracing::warn!(action = %e.0.action, "activity writer stopped; entry dropped");
        }
    }
}

/// Starts the writer task. It runs until every sender is dropped.
pub fn spawn_writer(db: Arc<Mutex<Connection>>) -> ChannelSink {
    let (tx, mut rx) = mpsc::unbounded_channel::<ActivityEntry>();
    tokio::spawn(async move {
        while let Some(entry) = rx.recv().await {
            let conn = db.lock().await;
            if let Err(e) = append(&conn, &entry) {
                tracing::warn!(
                    error = %e,
                    action = %entry.action,
                    entity_type = %entry.entity_type,
                    entity_id = ?entry.entity_id,
                    "failed to append activity entry"
                );
            }
        }
        tracing::debug!("activity writer finished");
    });
    ChannelSink { tx }
}

pub fn append(conn: &Connection, entry: &ActivityEntry) -> rusqlite::Result<i64> {
    let details = entry.details.as_ref().map(|d| d.to_string());
    conn.execute(
        "INSERT INTO activity_log(action, entity_type, entity_id, entity_name, user_name, details, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.entity_name,
            entry.user_name,
            details,
            db::now_ts()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Newest first. `details` is decoded when it holds a JSON object or array.
pub fn list(conn: &Connection, limit: i64) -> rusqlite::Result<Vec<Record>> {
    let mut rows = db::query_records(
        conn,
        "SELECT id, action, entity_type, entity_id, entity_name, user_name, details, created_at
         FROM activity_log
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
        [limit],
    )?;
    for row in rows.iter_mut() {
        if let Some(JsonValue::String(text)) = row.get("details") {
            if let Ok(parsed) = serde_json::from_str::<JsonValue>(text) {
                if parsed.is_object() || parsed.is_array() {
                    row.insert("details".to_string(), parsed);
                }
            }
        }
    }
    Ok(rows)
}
