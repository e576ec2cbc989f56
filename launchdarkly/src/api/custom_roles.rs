//! Custom role API implementation

use super::client::Client;
use super::common::{segment, PatchWithComment, Statement};
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRole {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub policy: Vec<Statement>,
    pub base_permissions: Option<String>,
}

/// Request body for POST /api/v2/roles
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRolePost {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub policy: Vec<Statement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_permissions: Option<String>,
}

pub struct CustomRolesApi<'a> {
    client: &'a Client,
}

impl<'a> CustomRolesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /api/v2/roles/{key}
    pub async fn get(&self, key: &str) -> Result<CustomRole, ApiError> {
        self.client
            .get(&format!("/api/v2/roles/{}", segment(key)))
            .await
    }

    /// POST /api/v2/roles
    pub async fn create(&self, body: &CustomRolePost) -> Result<CustomRole, ApiError> {
        self.client.post("/api/v2/roles", body).await
    }

    /// PATCH /api/v2/roles/{key}
    pub async fn patch(&self, key: &str, patch: &PatchWithComment) -> Result<CustomRole, ApiError> {
        self.client
            .patch_with_comment(&format!("/api/v2/roles/{}", segment(key)), patch)
            .await
    }

    /// DELETE /api/v2/roles/{key}
    pub async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/api/v2/roles/{}", segment(key)))
            .await
    }
}
