//! Segment API implementation

use super::client::Client;
use super::common::{segment, PatchWithComment};
use super::error::ApiError;
use super::flags::Clause;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default)]
    pub included_contexts: Vec<SegmentTarget>,
    #[serde(default)]
    pub excluded_contexts: Vec<SegmentTarget>,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
    #[serde(default)]
    pub creation_date: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentTarget {
    #[serde(default)]
    pub values: Vec<String>,
    pub context_kind: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRule {
    #[serde(rename = "_id", default, skip_serializing)]
    pub id: Option<String>,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_context_kind: Option<String>,
}

/// Request body for POST /api/v2/segments/{projectKey}/{envKey}
#[derive(Debug, Clone, Serialize)]
pub struct SegmentPost {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

pub struct SegmentsApi<'a> {
    client: &'a Client,
}

impl<'a> SegmentsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(project_key: &str, env_key: &str, key: &str) -> String {
        format!(
            "/api/v2/segments/{}/{}/{}",
            segment(project_key),
            segment(env_key),
            segment(key)
        )
    }

    /// GET /api/v2/segments/{projectKey}/{envKey}/{segmentKey}
    pub async fn get(&self, project_key: &str, env_key: &str, key: &str) -> Result<Segment, ApiError> {
        self.client.get(&Self::path(project_key, env_key, key)).await
    }

    /// POST /api/v2/segments/{projectKey}/{envKey}
    pub async fn create(
        &self,
        project_key: &str,
        env_key: &str,
        body: &SegmentPost,
    ) -> Result<Segment, ApiError> {
        self.client
            .post(
                &format!("/api/v2/segments/{}/{}", segment(project_key), segment(env_key)),
                body,
            )
            .await
    }

    /// PATCH /api/v2/segments/{projectKey}/{envKey}/{segmentKey}
    pub async fn patch(
        &self,
        project_key: &str,
        env_key: &str,
        key: &str,
        patch: &PatchWithComment,
    ) -> Result<Segment, ApiError> {
        self.client
            .patch_with_comment(&Self::path(project_key, env_key, key), patch)
            .await
    }

    /// DELETE /api/v2/segments/{projectKey}/{envKey}/{segmentKey}
    pub async fn delete(&self, project_key: &str, env_key: &str, key: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(project_key, env_key, key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::create_test_client;
    use mockito::Server;
    use serde_json::json;

    #[tokio::test]
    async fn get_parses_rules_and_contexts() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v2/segments/p/e/beta-users")
            .with_body(
                json!({
                    "key": "beta-users",
                    "name": "Beta users",
                    "included": ["a"],
                    "includedContexts": [{"values": ["org-1"], "contextKind": "organization"}],
                    "rules": [{
                        "_id": "r",
                        "clauses": [{"attribute": "email", "op": "endsWith", "values": ["@x.io"], "negate": false}],
                        "weight": 50000,
                        "bucketBy": "key"
                    }],
                    "creationDate": 1700000000000i64
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let seg = client.segments().get("p", "e", "beta-users").await.unwrap();

        assert_eq!(seg.included, vec!["a"]);
        assert_eq!(seg.included_contexts[0].context_kind, "organization");
        assert_eq!(seg.rules[0].weight, Some(50000));
        assert_eq!(seg.creation_date, 1_700_000_000_000);
    }
}
