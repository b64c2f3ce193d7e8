use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::db;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("storage not provisioned: {0}")]
    SchemaMissing(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        if db::is_missing_table(&e) {
            return ApiError::SchemaMissing(e.to_string());
        }
        match e.sqlite_error_code() {
            // UNIQUE, CHECK, NOT NULL and FOREIGN KEY failures come from the payload.
            Some(rusqlite::ErrorCode::ConstraintViolation) => ApiError::BadRequest(e.to_string()),
            _ => ApiError::Internal(e.into()),
        }
    }
}

/// Attached to 500 responses so [`log_failures`] can report them with the
/// request that caused them.
#[derive(Debug, Clone)]
pub struct InternalFailure {
    pub error_id: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingFields(fields) => {
                let message = format!("Missing required fields: {}", fields.join(", "));
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": message, "fields": fields })),
                )
                    .into_response()
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "error": "Method not allowed" })),
            )
                .into_response(),
            ApiError::SchemaMissing(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "Storage is not provisioned",
                    "message": msg,
                })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                let error_id = Uuid::new_v4().to_string();
                let message = format!("{e:#}");
                let mut resp = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error",
                        "message": message,
                        "errorId": error_id,
                    })),
                )
                    .into_response();
                resp.extensions_mut()
                    .insert(InternalFailure { error_id, message });
                resp
            }
        }
    }
}

/// Logs every internal failure together with the request that triggered it.
pub async fn log_failures(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let resp = next.run(req).await;
    if let Some(failure) = resp.extensions().get::<InternalFailure>() {
        tracing::error!(
            error_id = %failure.error_id,
            method = %method,
            uri = %uri,
            error = %failure.message,
            "request failed"
        );
    }
    resp
}
