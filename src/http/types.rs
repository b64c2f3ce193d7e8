use std::sync::Arc;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::activity::{self, ActivitySink};
use crate::config::ActivityConfig;
use crate::db::Record;
use crate::http::error::ApiError;
use crate::naming;

/// Shared by every handler. The connection is the storage handle each request
/// borrows for the duration of its statements.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub activity: Arc<dyn ActivitySink>,
    pub limits: ActivityConfig,
}

impl AppState {
    pub fn new(conn: Connection, activity: Arc<dyn ActivitySink>, limits: ActivityConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            activity,
            limits,
        }
    }

    /// Wires the channel-backed activity writer. Must run inside a tokio runtime.
    pub fn with_activity_writer(conn: Connection, limits: ActivityConfig) -> Self {
        let db = Arc::new(Mutex::new(conn));
        let sink = activity::spawn_writer(db.clone());
        Self {
            db,
            activity: Arc::new(sink),
            limits,
        }
    }
}

/// Query parameters shared by the resource endpoints. A query string that
/// does not parse is rejected as [`ApiError::BadRequest`].
#[derive(Debug, Default, Deserialize)]
pub struct ResourceQuery {
    pub id: Option<String>,
    pub user: Option<String>,
    #[serde(rename = "entityType", alias = "entity_type")]
    pub entity_type: Option<String>,
    pub limit: Option<String>,
}

impl ResourceQuery {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn require_id(&self) -> Result<&str, ApiError> {
        self.id()
            .ok_or_else(|| ApiError::bad_request("Missing id query parameter"))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ResourceQuery
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(q) = Query::<ResourceQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(q)
    }
}

/// JSON object body with its keys already rewritten to storage style.
/// An empty body reads as `{}`.
#[derive(Debug, Default)]
pub struct Payload(pub Record);

#[async_trait]
impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload(Record::new()));
        }
        let value: JsonValue = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
        match naming::to_storage_form(value) {
            JsonValue::Object(map) => Ok(Payload(map)),
            _ => Err(ApiError::bad_request("Request body must be a JSON object")),
        }
    }
}
