use reqwest::Method;
use serde_json::Value as JsonValue;

use super::{ClientError, DashboardClient};

#[derive(Debug, Clone)]
pub struct ActivityClient {
    client: DashboardClient,
}

impl ActivityClient {
    pub(super) fn new(client: DashboardClient) -> Self {
        Self { client }
    }

    /// Newest entries first; `None` uses the server default.
    pub async fn list(&self, limit: Option<u32>) -> Result<JsonValue, ClientError> {
        let mut req = self.client.request(Method::GET, "activity");
        if let Some(limit) = limit {
            req = req.query(&[("limit", limit)]);
        }
        self.client.send(req).await
    }
}
