use reqwest::Method;
use serde_json::Value as JsonValue;

use super::{ClientError, DashboardClient};
use crate::naming;

#[derive(Debug, Clone)]
pub struct GoalsClient {
    client: DashboardClient,
}

impl GoalsClient {
    pub(super) fn new(client: DashboardClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> Result<JsonValue, ClientError> {
        let req = self.client.request(Method::GET, "goals");
        self.client.send(req).await
    }

    /// Only the targets present in `changes` are touched.
    pub async fn update(&self, changes: JsonValue) -> Result<JsonValue, ClientError> {
        let req = self
            .client
            .request(Method::PUT, "goals")
            .json(&naming::to_storage_form(changes));
        self.client.send(req).await
    }
}
