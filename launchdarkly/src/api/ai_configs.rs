//! AI config API implementation (beta)

use super::client::Client;
use super::common::segment;
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "_version", default)]
    pub version: i64,
    #[serde(default)]
    pub maintainer: Option<AiConfigMaintainer>,
}

/// Either a member (`_id`) or a team (`key`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiConfigMaintainer {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

/// Request body for POST /api/v2/projects/{projectKey}/ai-configs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfigPost {
    pub key: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintainer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintainer_team_key: Option<String>,
}

/// JSON merge body for PATCH; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintainer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintainer_team_key: Option<String>,
}

pub struct AiConfigsApi {
    client: Client,
}

impl AiConfigsApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn path(project_key: &str, key: &str) -> String {
        format!(
            "/api/v2/projects/{}/ai-configs/{}",
            segment(project_key),
            segment(key)
        )
    }

    /// GET /api/v2/projects/{projectKey}/ai-configs/{key}
    pub async fn get(&self, project_key: &str, key: &str) -> Result<AiConfig, ApiError> {
        self.client.get(&Self::path(project_key, key)).await
    }

    /// POST /api/v2/projects/{projectKey}/ai-configs
    pub async fn create(&self, project_key: &str, body: &AiConfigPost) -> Result<AiConfig, ApiError> {
        self.client
            .post(
                &format!("/api/v2/projects/{}/ai-configs", segment(project_key)),
                body,
            )
            .await
    }

    /// PATCH /api/v2/projects/{projectKey}/ai-configs/{key}
    pub async fn patch(
        &self,
        project_key: &str,
        key: &str,
        body: &AiConfigPatch,
    ) -> Result<AiConfig, ApiError> {
        self.client.patch_json(&Self::path(project_key, key), body).await
    }

    /// DELETE /api/v2/projects/{projectKey}/ai-configs/{key}
    pub async fn delete(&self, project_key: &str, key: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(project_key, key)).await
    }
}
