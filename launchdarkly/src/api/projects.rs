//! Project API implementation

use super::client::Client;
use super::common::{segment, ApiQueryParams, ClientSideAvailability, Items, PatchOperation};
use super::environments::{Environment, EnvironmentPost};
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub include_in_snippet_by_default: bool,
    pub default_client_side_availability: Option<ClientSideAvailability>,
    /// Only populated when requested with `expand=environments`
    #[serde(default)]
    pub environments: Option<Items<Environment>>,
}

impl Project {
    pub fn environment_list(&self) -> &[Environment] {
        self.environments
            .as_ref()
            .map(|e| e.items.as_slice())
            .unwrap_or_default()
    }
}

/// Request body for POST /api/v2/projects
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPost {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<EnvironmentPost>,
}

pub struct ProjectsApi<'a> {
    client: &'a Client,
}

impl<'a> ProjectsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /api/v2/projects/{key}?expand=environments
    pub async fn get(&self, key: &str) -> Result<Project, ApiError> {
        let params = ApiQueryParams::new().add("expand", "environments");
        self.client
            .get_with_params(&format!("/api/v2/projects/{}", segment(key)), &params)
            .await
    }

    /// POST /api/v2/projects
    pub async fn create(&self, body: &ProjectPost) -> Result<Project, ApiError> {
        self.client.post("/api/v2/projects", body).await
    }

    /// PATCH /api/v2/projects/{key}
    pub async fn patch(&self, key: &str, ops: &[PatchOperation]) -> Result<Project, ApiError> {
        self.client
            .patch(&format!("/api/v2/projects/{}", segment(key)), ops)
            .await
    }

    /// DELETE /api/v2/projects/{key}
    pub async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/api/v2/projects/{}", segment(key)))
            .await
    }
}
