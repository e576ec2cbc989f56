//! Audit log subscription (integration) API implementation

use super::client::Client;
use super::common::{segment, PatchOperation, Statement};
use super::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogSubscription {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request body for POST /api/v2/integrations/{integrationKey}
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogSubscriptionPost {
    pub name: String,
    pub config: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<Statement>,
    pub on: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

pub struct AuditLogSubscriptionsApi<'a> {
    client: &'a Client,
}

impl<'a> AuditLogSubscriptionsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(integration_key: &str, id: &str) -> String {
        format!("/api/v2/integrations/{}/{}", segment(integration_key), segment(id))
    }

    /// GET /api/v2/integrations/{integrationKey}/{id}
    pub async fn get(&self, integration_key: &str, id: &str) -> Result<AuditLogSubscription, ApiError> {
        self.client.get(&Self::path(integration_key, id)).await
    }

    /// POST /api/v2/integrations/{integrationKey}
    pub async fn create(
        &self,
        integration_key: &str,
        body: &AuditLogSubscriptionPost,
    ) -> Result<AuditLogSubscription, ApiError> {
        self.client
            .post(&format!("/api/v2/integrations/{}", segment(integration_key)), body)
            .await
    }

    /// PATCH /api/v2/integrations/{integrationKey}/{id}
    pub async fn patch(
        &self,
        integration_key: &str,
        id: &str,
        ops: &[PatchOperation],
    ) -> Result<AuditLogSubscription, ApiError> {
        self.client.patch(&Self::path(integration_key, id), ops).await
    }

    /// DELETE /api/v2/integrations/{integrationKey}/{id}
    pub async fn delete(&self, integration_key: &str, id: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(integration_key, id)).await
    }
}
