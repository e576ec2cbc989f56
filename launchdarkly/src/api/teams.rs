//! Team API implementation

use super::client::Client;
use super::common::{segment, ApiQueryParams, Items, SemanticPatch};
use super::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

const MEMBERS_PAGE_SIZE: usize = 50;
pub const MAINTAIN_TEAM: &str = "maintainTeam";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Team {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub roles: Option<Items<RoleRef>>,
    #[serde(default)]
    pub maintainers: Option<Items<MemberRef>>,
}

impl Team {
    pub fn custom_role_keys(&self) -> Vec<String> {
        self.roles
            .iter()
            .flat_map(|r| r.items.iter().map(|role| role.key.clone()))
            .collect()
    }

    pub fn maintainer_ids(&self) -> Vec<String> {
        self.maintainers
            .iter()
            .flat_map(|m| m.items.iter().map(|member| member.id.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleRef {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberRef {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MembersPage {
    #[serde(default)]
    items: Vec<MemberRef>,
    #[serde(rename = "_links", default)]
    links: HashMap<String, Link>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrantInput {
    pub action_set: String,
    #[serde(rename = "memberIDs")]
    pub member_ids: Vec<String>,
}

/// Request body for POST /api/v2/teams
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPost {
    pub key: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "memberIDs", skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_role_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permission_grants: Vec<PermissionGrantInput>,
}

/// Semantic patch instruction for a team update.
#[derive(Debug, Clone, PartialEq)]
pub enum TeamInstruction {
    UpdateName(String),
    UpdateDescription(String),
    AddMembers(Vec<String>),
    RemoveMembers(Vec<String>),
    AddCustomRoles(Vec<String>),
    RemoveCustomRoles(Vec<String>),
    AddMaintainers(Vec<String>),
    RemoveMaintainers(Vec<String>),
}

impl TeamInstruction {
    pub fn to_json(&self) -> Value {
        match self {
            TeamInstruction::UpdateName(v) => json!({"kind": "updateName", "value": v}),
            TeamInstruction::UpdateDescription(v) => {
                json!({"kind": "updateDescription", "value": v})
            }
            TeamInstruction::AddMembers(ids) => json!({"kind": "addMembers", "values": ids}),
            TeamInstruction::RemoveMembers(ids) => json!({"kind": "removeMembers", "values": ids}),
            TeamInstruction::AddCustomRoles(keys) => {
                json!({"kind": "addCustomRoles", "values": keys})
            }
            TeamInstruction::RemoveCustomRoles(keys) => {
                json!({"kind": "removeCustomRoles", "values": keys})
            }
            TeamInstruction::AddMaintainers(ids) => json!({
                "kind": "addPermissionGrants",
                "actionSet": MAINTAIN_TEAM,
                "memberIDs": ids
            }),
            TeamInstruction::RemoveMaintainers(ids) => json!({
                "kind": "removePermissionGrants",
                "actionSet": MAINTAIN_TEAM,
                "memberIDs": ids
            }),
        }
    }
}

pub struct TeamsApi<'a> {
    client: &'a Client,
}

impl<'a> TeamsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /api/v2/teams/{key}?expand=roles,maintainers
    pub async fn get(&self, key: &str) -> Result<Team, ApiError> {
        let params = ApiQueryParams::new().add("expand", "roles,maintainers");
        self.client
            .get_with_params(&format!("/api/v2/teams/{}", segment(key)), &params)
            .await
    }

    /// GET /api/v2/members?filter=team:{key}, following pages until exhausted
    pub async fn member_ids(&self, key: &str) -> Result<Vec<String>, ApiError> {
        let mut ids = Vec::new();
        let mut offset = 0;
        loop {
            let params = ApiQueryParams::new()
                .add("limit", MEMBERS_PAGE_SIZE)
                .add("offset", offset)
                .add("filter", format!("team:{}", key));
            let page: MembersPage = self.client.get_with_params("/api/v2/members", &params).await?;

            let count = page.items.len();
            ids.extend(page.items.into_iter().map(|m| m.id));

            let has_next = page
                .links
                .get("next")
                .is_some_and(|l| l.href.as_deref().is_some_and(|h| !h.is_empty()));
            if !has_next || count == 0 {
                return Ok(ids);
            }
            offset += MEMBERS_PAGE_SIZE;
        }
    }

    /// POST /api/v2/teams
    pub async fn create(&self, body: &TeamPost) -> Result<Team, ApiError> {
        self.client.post("/api/v2/teams", body).await
    }

    /// PATCH /api/v2/teams/{key} (semantic patch)
    pub async fn update(&self, key: &str, instructions: &[TeamInstruction]) -> Result<Team, ApiError> {
        let patch = SemanticPatch {
            comment: Some("Terraform".to_string()),
            instructions: instructions.iter().map(TeamInstruction::to_json).collect(),
        };
        self.client
            .patch_semantic(&format!("/api/v2/teams/{}", segment(key)), &patch)
            .await
    }

    /// DELETE /api/v2/teams/{key}
    pub async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/api/v2/teams/{}", segment(key)))
            .await
    }
}
