//! Environment API implementation

use super::client::Client;
use super::common::{segment, PatchOperation};
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Client-side ID
    #[serde(rename = "_id", default)]
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub mob_key: String,
    #[serde(default)]
    pub default_ttl: i64,
    #[serde(default)]
    pub secure_mode: bool,
    #[serde(default)]
    pub default_track_events: bool,
    #[serde(default)]
    pub require_comments: bool,
    #[serde(default)]
    pub confirm_changes: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub approval_settings: Option<ApprovalSettings>,
}

/// Change approval rules of an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSettings {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub can_review_own_request: bool,
    #[serde(default = "default_min_num_approvals")]
    pub min_num_approvals: i64,
    #[serde(default = "default_can_apply_declined_changes")]
    pub can_apply_declined_changes: bool,
    #[serde(default)]
    pub required_approval_tags: Vec<String>,
}

fn default_min_num_approvals() -> i64 {
    1
}

fn default_can_apply_declined_changes() -> bool {
    true
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            required: false,
            can_review_own_request: false,
            min_num_approvals: default_min_num_approvals(),
            can_apply_declined_changes: default_can_apply_declined_changes(),
            required_approval_tags: Vec::new(),
        }
    }
}

/// Request body for POST /api/v2/projects/{projectKey}/environments, also
/// embedded in a project post.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentPost {
    pub key: String,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_track_events: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_changes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_comments: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

pub struct EnvironmentsApi<'a> {
    client: &'a Client,
}

impl<'a> EnvironmentsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(project_key: &str, env_key: &str) -> String {
        format!(
            "/api/v2/projects/{}/environments/{}",
            segment(project_key),
            segment(env_key)
        )
    }

    /// GET /api/v2/projects/{projectKey}/environments/{envKey}
    pub async fn get(&self, project_key: &str, env_key: &str) -> Result<Environment, ApiError> {
        self.client.get(&Self::path(project_key, env_key)).await
    }

    /// POST /api/v2/projects/{projectKey}/environments
    pub async fn create(
        &self,
        project_key: &str,
        body: &EnvironmentPost,
    ) -> Result<Environment, ApiError> {
        self.client
            .post(
                &format!("/api/v2/projects/{}/environments", segment(project_key)),
                body,
            )
            .await
    }

    /// PATCH /api/v2/projects/{projectKey}/environments/{envKey}
    pub async fn patch(
        &self,
        project_key: &str,
        env_key: &str,
        ops: &[PatchOperation],
    ) -> Result<Environment, ApiError> {
        self.client.patch(&Self::path(project_key, env_key), ops).await
    }

    /// DELETE /api/v2/projects/{projectKey}/environments/{envKey}
    pub async fn delete(&self, project_key: &str, env_key: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(project_key, env_key)).await
    }
}
