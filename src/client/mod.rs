//! HTTP client for the dashboard API.
//!
//! Callers work in display style (`weekId`); bodies are rewritten to storage
//! style before they are sent and responses are rewritten back on arrival.
//! Any non-2xx status is returned as [`ClientError::Status`]. There are no
//! retries and no caching.

mod activity;
mod goals;
mod resource;

pub use activity::ActivityClient;
pub use goals::GoalsClient;
pub use resource::{Resource, ResourceClient};

use reqwest::RequestBuilder;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::naming;

#[derive(Debug, Error)]
pub enum ClientError {
    /// `body` has its keys in display style, but values are left alone: the
    /// `fields` list of a 400 names columns in storage style (`school_type`).
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: JsonValue },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
}

impl DashboardClient {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8787/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn tasks(&self) -> ResourceClient {
        ResourceClient::new(self.clone(), Resource::Tasks)
    }

    pub fn teachers(&self) -> ResourceClient {
        ResourceClient::new(self.clone(), Resource::Teachers)
    }

    pub fn interviews(&self) -> ResourceClient {
        ResourceClient::new(self.clone(), Resource::Interviews)
    }

    pub fn knowledge_cards(&self) -> ResourceClient {
        ResourceClient::new(self.clone(), Resource::KnowledgeCards)
    }

    pub fn knowledge_items(&self) -> ResourceClient {
        ResourceClient::new(self.clone(), Resource::KnowledgeItems)
    }

    pub fn goals(&self) -> GoalsClient {
        GoalsClient::new(self.clone())
    }

    pub fn activity(&self) -> ActivityClient {
        ActivityClient::new(self.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    async fn send(&self, req: RequestBuilder) -> Result<JsonValue, ClientError> {
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let body = if text.trim().is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
        };
        let body = naming::to_display_form(body);
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "dashboard request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
