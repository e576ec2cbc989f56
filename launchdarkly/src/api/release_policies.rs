//! Release policy API implementation (beta)

use super::client::Client;
use super::common::segment;
use super::error::ApiError;
use serde::{Deserialize, Serialize};

pub const GUARDED_RELEASE: &str = "guarded-release";
pub const PROGRESSIVE_RELEASE: &str = "progressive-release";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePolicy {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing)]
    pub project_key: String,
    pub release_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ReleasePolicyScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guarded_release_config: Option<GuardedReleaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePolicyScope {
    #[serde(default)]
    pub environment_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardedReleaseConfig {
    pub rollback_on_regression: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sample_size: Option<i64>,
}

/// Endpoints behind `LD-API-Version: beta`. Holds its own beta client.
pub struct ReleasePoliciesApi {
    client: Client,
}

impl ReleasePoliciesApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn path(project_key: &str, key: &str) -> String {
        format!(
            "/api/v2/projects/{}/release-policies/{}",
            segment(project_key),
            segment(key)
        )
    }

    /// GET /api/v2/projects/{projectKey}/release-policies/{key}
    pub async fn get(&self, project_key: &str, key: &str) -> Result<ReleasePolicy, ApiError> {
        self.client.get(&Self::path(project_key, key)).await
    }

    /// POST /api/v2/projects/{projectKey}/release-policies
    pub async fn create(
        &self,
        project_key: &str,
        policy: &ReleasePolicy,
    ) -> Result<ReleasePolicy, ApiError> {
        self.client
            .post(
                &format!("/api/v2/projects/{}/release-policies", segment(project_key)),
                policy,
            )
            .await
    }

    /// PUT /api/v2/projects/{projectKey}/release-policies/{key}
    pub async fn replace(
        &self,
        project_key: &str,
        key: &str,
        policy: &ReleasePolicy,
    ) -> Result<ReleasePolicy, ApiError> {
        self.client.put(&Self::path(project_key, key), policy).await
    }

    /// DELETE /api/v2/projects/{projectKey}/release-policies/{key}
    pub async fn delete(&self, project_key: &str, key: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(project_key, key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::create_test_client;
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn replace_uses_put_on_beta() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/v2/projects/p/release-policies/safe")
            .match_header("ld-api-version", "beta")
            .match_body(Matcher::Json(json!({
                "key": "safe",
                "name": "Safe",
                "releaseMethod": "guarded-release",
                "scope": {"environmentKeys": ["production"]},
                "guardedReleaseConfig": {"rollbackOnRegression": true, "minSampleSize": 100}
            })))
            .with_body(
                json!({
                    "id": "rp-1",
                    "key": "safe",
                    "name": "Safe",
                    "projectKey": "p",
                    "releaseMethod": "guarded-release"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let policy = ReleasePolicy {
            key: "safe".to_string(),
            name: "Safe".to_string(),
            release_method: GUARDED_RELEASE.to_string(),
            scope: Some(ReleasePolicyScope {
                environment_keys: vec!["production".to_string()],
            }),
            guarded_release_config: Some(GuardedReleaseConfig {
                rollback_on_regression: true,
                min_sample_size: Some(100),
            }),
            ..Default::default()
        };
        let saved = client
            .release_policies()
            .replace("p", "safe", &policy)
            .await
            .unwrap();

        assert_eq!(saved.project_key, "p");
        mock.assert_async().await;
    }
}
