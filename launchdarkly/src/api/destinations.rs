//! Data export destination API implementation

use super::client::Client;
use super::common::{segment, PatchOperation};
use super::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Destination {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub on: bool,
}

/// Request body for POST /api/v2/destinations/{projectKey}/{envKey}
#[derive(Debug, Clone, Serialize)]
pub struct DestinationPost {
    pub name: String,
    pub kind: String,
    pub config: Map<String, Value>,
    pub on: bool,
}

pub struct DestinationsApi<'a> {
    client: &'a Client,
}

impl<'a> DestinationsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn collection(project_key: &str, env_key: &str) -> String {
        format!("/api/v2/destinations/{}/{}", segment(project_key), segment(env_key))
    }

    fn path(project_key: &str, env_key: &str, id: &str) -> String {
        format!("{}/{}", Self::collection(project_key, env_key), segment(id))
    }

    /// GET /api/v2/destinations/{projectKey}/{envKey}/{id}
    pub async fn get(&self, project_key: &str, env_key: &str, id: &str) -> Result<Destination, ApiError> {
        self.client.get(&Self::path(project_key, env_key, id)).await
    }

    /// POST /api/v2/destinations/{projectKey}/{envKey}
    pub async fn create(
        &self,
        project_key: &str,
        env_key: &str,
        body: &DestinationPost,
    ) -> Result<Destination, ApiError> {
        self.client
            .post(&Self::collection(project_key, env_key), body)
            .await
    }

    /// PATCH /api/v2/destinations/{projectKey}/{envKey}/{id}
    pub async fn patch(
        &self,
        project_key: &str,
        env_key: &str,
        id: &str,
        ops: &[PatchOperation],
    ) -> Result<Destination, ApiError> {
        self.client.patch(&Self::path(project_key, env_key, id), ops).await
    }

    /// DELETE /api/v2/destinations/{projectKey}/{envKey}/{id}
    pub async fn delete(&self, project_key: &str, env_key: &str, id: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(project_key, env_key, id)).await
    }
}
