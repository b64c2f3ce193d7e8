use reqwest::Method;
use serde_json::Value as JsonValue;

use super::{ClientError, DashboardClient};
use crate::naming;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Tasks,
    Teachers,
    Interviews,
    KnowledgeCards,
    KnowledgeItems,
}

impl Resource {
    fn path(self) -> &'static str {
        match self {
            Resource::Tasks => "tasks",
            Resource::Teachers => "teachers",
            Resource::Interviews => "interviews",
            Resource::KnowledgeCards | Resource::KnowledgeItems => "knowledge",
        }
    }

    fn entity_type(self) -> Option<&'static str> {
        match self {
            Resource::KnowledgeCards => Some("card"),
            Resource::KnowledgeItems => Some("item"),
            _ => None,
        }
    }
}

/// `get_all / get / create / update / delete` for one resource.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    client: DashboardClient,
    resource: Resource,
}

impl ResourceClient {
    pub(super) fn new(client: DashboardClient, resource: Resource) -> Self {
        Self { client, resource }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    fn query<'a>(&self, extra: &[(&'static str, &'a str)]) -> Vec<(&'static str, &'a str)> {
        let mut q: Vec<(&'static str, &'a str)> = Vec::new();
        if let Some(entity) = self.resource.entity_type() {
            q.push(("entityType", entity));
        }
        q.extend_from_slice(extra);
        q
    }

    pub async fn get_all(&self) -> Result<JsonValue, ClientError> {
        let req = self
            .client
            .request(Method::GET, self.resource.path())
            .query(&self.query(&[]));
        self.client.send(req).await
    }

    pub async fn get(&self, id: &str) -> Result<JsonValue, ClientError> {
        let req = self
            .client
            .request(Method::GET, self.resource.path())
            .query(&self.query(&[("id", id)]));
        self.client.send(req).await
    }

    pub async fn create(&self, body: JsonValue) -> Result<JsonValue, ClientError> {
        let req = self
            .client
            .request(Method::POST, self.resource.path())
            .query(&self.query(&[]))
            .json(&naming::to_storage_form(body));
        self.client.send(req).await
    }

    pub async fn update(&self, id: &str, body: JsonValue) -> Result<JsonValue, ClientError> {
        let req = self
            .client
            .request(Method::PUT, self.resource.path())
            .query(&self.query(&[("id", id)]))
            .json(&naming::to_storage_form(body));
        self.client.send(req).await
    }

    pub async fn delete(&self, id: &str) -> Result<JsonValue, ClientError> {
        let req = self
            .client
            .request(Method::DELETE, self.resource.path())
            .query(&self.query(&[("id", id)]));
        self.client.send(req).await
    }

    /// Delete with an actor name for the activity log (tasks).
    pub async fn delete_as(&self, id: &str, user: &str) -> Result<JsonValue, ClientError> {
        let req = self
            .client
            .request(Method::DELETE, self.resource.path())
            .query(&self.query(&[("id", id), ("user", user)]));
        self.client.send(req).await
    }
}
