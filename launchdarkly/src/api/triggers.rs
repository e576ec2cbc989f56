//! Flag trigger API implementation

use super::client::Client;
use super::common::{segment, SemanticPatch};
use super::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TRIGGER_INTEGRATIONS: [&str; 6] = [
    "generic-trigger",
    "datadog",
    "dynatrace",
    "honeycomb",
    "new-relic-apm",
    "signalfx",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_integrationKey", default)]
    pub integration_key: String,
    #[serde(default)]
    pub instructions: Vec<Value>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "triggerURL", default)]
    pub trigger_url: Option<String>,
    #[serde(rename = "_maintainerId", default)]
    pub maintainer_id: Option<String>,
}

impl Trigger {
    /// Flag action carried by the first instruction, e.g. `turnFlagOn`.
    pub fn action(&self) -> Option<&str> {
        self.instructions.first()?.get("kind")?.as_str()
    }
}

/// Request body for POST /api/v2/flags/{projectKey}/{flagKey}/triggers/{envKey}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPost {
    pub integration_key: String,
    pub instructions: Vec<Value>,
}

pub fn action_instruction(kind: &str) -> Value {
    json!({"kind": kind})
}

pub fn replace_action_instruction(kind: &str) -> Value {
    json!({"kind": "replaceTriggerActionInstructions", "value": [{"kind": kind}]})
}

pub fn enabled_instruction(enabled: bool) -> Value {
    json!({"kind": if enabled { "enableTrigger" } else { "disableTrigger" }})
}

pub struct TriggersApi<'a> {
    client: &'a Client,
}

impl<'a> TriggersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn collection(project_key: &str, flag_key: &str, env_key: &str) -> String {
        format!(
            "/api/v2/flags/{}/{}/triggers/{}",
            segment(project_key),
            segment(flag_key),
            segment(env_key)
        )
    }

    /// GET /api/v2/flags/{projectKey}/{flagKey}/triggers/{envKey}/{id}
    pub async fn get(
        &self,
        project_key: &str,
        flag_key: &str,
        env_key: &str,
        id: &str,
    ) -> Result<Trigger, ApiError> {
        let path = format!("{}/{}", Self::collection(project_key, flag_key, env_key), segment(id));
        self.client.get(&path).await
    }

    /// POST /api/v2/flags/{projectKey}/{flagKey}/triggers/{envKey}
    pub async fn create(
        &self,
        project_key: &str,
        flag_key: &str,
        env_key: &str,
        body: &TriggerPost,
    ) -> Result<Trigger, ApiError> {
        self.client
            .post(&Self::collection(project_key, flag_key, env_key), body)
            .await
    }

    /// PATCH /api/v2/flags/{projectKey}/{flagKey}/triggers/{envKey}/{id}
    pub async fn update(
        &self,
        project_key: &str,
        flag_key: &str,
        env_key: &str,
        id: &str,
        instructions: Vec<Value>,
    ) -> Result<Trigger, ApiError> {
        let path = format!("{}/{}", Self::collection(project_key, flag_key, env_key), segment(id));
        let patch = SemanticPatch {
            comment: None,
            instructions,
        };
        self.client.patch_semantic(&path, &patch).await
    }

    /// DELETE /api/v2/flags/{projectKey}/{flagKey}/triggers/{envKey}/{id}
    pub async fn delete(
        &self,
        project_key: &str,
        flag_key: &str,
        env_key: &str,
        id: &str,
    ) -> Result<(), ApiError> {
        let path = format!("{}/{}", Self::collection(project_key, flag_key, env_key), segment(id));
        self.client.delete(&path).await
    }
}
