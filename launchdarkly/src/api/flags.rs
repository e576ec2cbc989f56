//! Feature flag API implementation, including the targeting model shared
//! with segments.

use super::client::Client;
use super::common::{segment, ApiQueryParams, ClientSideAvailability, PatchWithComment};
use super::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `boolean` or `multivariate`
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub include_in_snippet: bool,
    pub client_side_availability: Option<ClientSideAvailability>,
    pub defaults: Option<Defaults>,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, CustomProperty>,
    #[serde(default)]
    pub archived: bool,
    pub maintainer_id: Option<String>,
    pub maintainer_team_key: Option<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, FlagEnvironment>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Variation {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    pub on_variation: usize,
    pub off_variation: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomProperty {
    pub name: String,
    #[serde(default)]
    pub value: Vec<String>,
}

/// Per-environment targeting configuration of a flag.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEnvironment {
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub track_events: bool,
    pub off_variation: Option<usize>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub fallthrough: Option<Fallthrough>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub context_targets: Vec<Target>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    pub attribute: String,
    pub op: String,
    #[serde(default)]
    pub values: Vec<Value>,
    #[serde(default)]
    pub negate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedVariation {
    pub variation: usize,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    pub variations: Vec<WeightedVariation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(rename = "_id", default, skip_serializing)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<Rollout>,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub track_events: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fallthrough {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<Rollout>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub values: Vec<String>,
    pub variation: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Prerequisite {
    pub key: String,
    pub variation: usize,
}

/// Request body for POST /api/v2/flags/{projectKey}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagPost {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub variations: Vec<Variation>,
    pub temporary: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_side_availability: Option<ClientSideAvailability>,
}

pub struct FlagsApi<'a> {
    client: &'a Client,
}

impl<'a> FlagsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(project_key: &str, flag_key: &str) -> String {
        format!("/api/v2/flags/{}/{}", segment(project_key), segment(flag_key))
    }

    /// GET /api/v2/flags/{projectKey}/{flagKey}
    pub async fn get(&self, project_key: &str, flag_key: &str) -> Result<FeatureFlag, ApiError> {
        self.client.get(&Self::path(project_key, flag_key)).await
    }

    /// GET /api/v2/flags/{projectKey}/{flagKey}?env={envKey}
    pub async fn get_in_environment(
        &self,
        project_key: &str,
        flag_key: &str,
        env_key: &str,
    ) -> Result<FeatureFlag, ApiError> {
        let params = ApiQueryParams::new().add("env", env_key);
        self.client
            .get_with_params(&Self::path(project_key, flag_key), &params)
            .await
    }

    /// POST /api/v2/flags/{projectKey}
    pub async fn create(
        &self,
        project_key: &str,
        body: &FeatureFlagPost,
    ) -> Result<FeatureFlag, ApiError> {
        self.client
            .post(&format!("/api/v2/flags/{}", segment(project_key)), body)
            .await
    }

    /// PATCH /api/v2/flags/{projectKey}/{flagKey}
    pub async fn patch(
        &self,
        project_key: &str,
        flag_key: &str,
        patch: &PatchWithComment,
    ) -> Result<FeatureFlag, ApiError> {
        self.client
            .patch_with_comment(&Self::path(project_key, flag_key), patch)
            .await
    }

    /// DELETE /api/v2/flags/{projectKey}/{flagKey}
    pub async fn delete(&self, project_key: &str, flag_key: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(project_key, flag_key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::create_test_client;
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn flag_environment_parses_targeting() {
        let env: FlagEnvironment = serde_json::from_value(json!({
            "on": true,
            "offVariation": 1,
            "rules": [{
                "_id": "r1",
                "clauses": [{"attribute": "country", "op": "in", "values": ["us"], "negate": false}],
                "rollout": {"variations": [{"variation": 0, "weight": 60000}, {"variation": 1, "weight": 40000}], "bucketBy": "email"}
            }],
            "fallthrough": {"variation": 0},
            "targets": [{"values": ["a"], "variation": 1}],
            "contextTargets": [{"values": [], "variation": 1, "contextKind": "user"}],
            "prerequisites": [{"key": "other", "variation": 0}]
        }))
        .unwrap();

        assert!(env.on);
        assert_eq!(env.off_variation, Some(1));
        let rollout = env.rules[0].rollout.as_ref().unwrap();
        assert_eq!(rollout.bucket_by.as_deref(), Some("email"));
        assert_eq!(rollout.variations[1].weight, 40000);
        assert_eq!(env.fallthrough.unwrap().variation, Some(0));
        assert_eq!(env.context_targets[0].context_kind.as_deref(), Some("user"));
    }

    #[test]
    fn rule_id_is_never_sent() {
        let rule = Rule {
            id: Some("r1".to_string()),
            variation: Some(0),
            ..Default::default()
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert!(value.get("_id").is_none());
        assert_eq!(value["variation"], 0);
    }

    #[tokio::test]
    async fn get_in_environment_filters_by_env() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/flags/p/f")
            .match_query(Matcher::UrlEncoded("env".into(), "production".into()))
            .with_body(
                json!({
                    "key": "f",
                    "name": "F",
                    "kind": "boolean",
                    "variations": [{"_id": "v0", "value": true}, {"_id": "v1", "value": false}],
                    "environments": {"production": {"on": true}}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let flag = client
            .flags()
            .get_in_environment("p", "f", "production")
            .await
            .unwrap();

        assert_eq!(flag.variations.len(), 2);
        assert!(flag.environments["production"].on);
        mock.assert_async().await;
    }
}
