use super::attributes::{id, key, optional_string, required_string, string_set_attr};
use super::error::{ApiContext, ResourceError};
use super::managed::{key_or_id, read_back, seeded, Orchestrator};
use crate::api::teams::{PermissionGrantInput, Team, TeamInstruction, TeamPost, MAINTAIN_TEAM};
use crate::api::Client;
use crate::convert::{string_list, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tfplug::schema::{Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

pub fn team_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages a team of members")
        .attribute(id())
        .attribute(key("key", "Unique key of the team"))
        .attribute(required_string("name", "Display name"))
        .attribute(optional_string("description", "Description"))
        .attribute(string_set_attr("member_ids", "IDs of the team's members"))
        .attribute(string_set_attr("maintainers", "IDs of members who maintain the team"))
        .attribute(string_set_attr("custom_role_keys", "Keys of custom roles granted to the team"))
        .build()
}

pub fn team_to_state(team: &Team, member_ids: &[String]) -> Dynamic {
    Dynamic::object([
        ("id", Dynamic::from(team.key.as_str())),
        ("key", Dynamic::from(team.key.as_str())),
        ("name", Dynamic::from(team.name.as_str())),
        ("description", Dynamic::from(team.description.as_str())),
        ("member_ids", string_list(member_ids)),
        ("maintainers", string_list(&team.maintainer_ids())),
        ("custom_role_keys", string_list(&team.custom_role_keys())),
    ])
}

/// Team plus its paginated member list; `Ok(None)` when the team is gone.
pub async fn read_team(client: &Client, key: &str) -> Result<Option<Dynamic>, ResourceError> {
    let Some(team) = client
        .teams()
        .get(key)
        .await
        .absent_during("read", "team", key)?
    else {
        return Ok(None);
    };
    let members = client
        .teams()
        .member_ids(key)
        .await
        .during("read", "team", key)?;
    Ok(Some(team_to_state(&team, &members)))
}

fn set_of(attrs: Attrs<'_>, name: &str) -> BTreeSet<String> {
    attrs.strings(name).into_iter().collect()
}

/// Instructions that move a team from `prior` to `config`. Set changes
/// are expressed as additions and removals.
fn team_instructions(prior: Attrs<'_>, config: Attrs<'_>) -> Vec<TeamInstruction> {
    let mut instructions = Vec::new();
    let name = config.str_or_empty("name");
    if prior.str_or_empty("name") != name {
        instructions.push(TeamInstruction::UpdateName(name));
    }
    let description = config.str_or_empty("description");
    if prior.str_or_empty("description") != description {
        instructions.push(TeamInstruction::UpdateDescription(description));
    }

    let diffs: [(&str, fn(Vec<String>) -> TeamInstruction, fn(Vec<String>) -> TeamInstruction); 3] = [
        ("member_ids", TeamInstruction::AddMembers, TeamInstruction::RemoveMembers),
        ("custom_role_keys", TeamInstruction::AddCustomRoles, TeamInstruction::RemoveCustomRoles),
        ("maintainers", TeamInstruction::AddMaintainers, TeamInstruction::RemoveMaintainers),
    ];
    for (name, add, remove) in diffs {
        let old = set_of(prior, name);
        let new = set_of(config, name);
        let added: Vec<String> = new.difference(&old).cloned().collect();
        let removed: Vec<String> = old.difference(&new).cloned().collect();
        if !added.is_empty() {
            instructions.push(add(added));
        }
        if !removed.is_empty() {
            instructions.push(remove(removed));
        }
    }
    instructions
}

#[derive(Default)]
pub struct TeamResource;

#[async_trait]
impl Orchestrator for TeamResource {
    const TYPE_NAME: &'static str = "launchdarkly_team";
    const NOUN: &'static str = "team";

    fn schema() -> Schema {
        team_schema()
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        if id.is_empty() {
            return Err(ConvertError::validation("team import ID must be the team key"));
        }
        Ok(vec![(AttributePath::new("key"), id.to_string())])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        let key = attrs.str_or_empty("key");
        let maintainers = attrs.strings("maintainers");
        let post = TeamPost {
            key: key.clone(),
            name: attrs.str_or_empty("name"),
            description: attrs.str_or_empty("description"),
            member_ids: attrs.strings("member_ids"),
            custom_role_keys: attrs.strings("custom_role_keys"),
            permission_grants: if maintainers.is_empty() {
                Vec::new()
            } else {
                vec![PermissionGrantInput {
                    action_set: MAINTAIN_TEAM.to_string(),
                    member_ids: maintainers,
                }]
            },
        };
        session
            .client
            .teams()
            .create(&post)
            .await
            .during("create", Self::NOUN, &key)?;
        read_back(self, session, &seeded(config, &key), "create", &key).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let key = key_or_id(Attrs::of(state), "key");
        Ok(read_team(&session.client, &key).await?.map(DynamicValue::new))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let key = key_or_id(Attrs::of(prior), "key");
        let instructions = team_instructions(Attrs::of(prior), Attrs::of(config));
        if !instructions.is_empty() {
            session
                .client
                .teams()
                .update(&key, &instructions)
                .await
                .during("update", Self::NOUN, &key)?;
        }
        read_back(self, session, &seeded(config, &key), "update", &key).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let key = key_or_id(Attrs::of(prior), "key");
        session
            .client
            .teams()
            .delete(&key)
            .await
            .during("delete", Self::NOUN, &key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_session;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn team(name: &str, members: &[&str], maintainers: &[&str]) -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("key", Dynamic::from("platform")),
            ("name", Dynamic::from(name)),
            ("member_ids", Dynamic::string_list(members.iter().copied())),
            ("maintainers", Dynamic::string_list(maintainers.iter().copied())),
        ]))
    }

    #[test]
    fn instructions_cover_only_what_changed() {
        let prior = team("Platform", &["a", "b"], &["a"]);
        let next = team("Platform team", &["b", "c"], &["a"]);
        let instructions = team_instructions(Attrs::of(&prior), Attrs::of(&next));
        assert_eq!(
            instructions,
            vec![
                TeamInstruction::UpdateName("Platform team".to_string()),
                TeamInstruction::AddMembers(vec!["c".to_string()]),
                TeamInstruction::RemoveMembers(vec!["a".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn create_grants_maintainers_and_reads_members() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", "/api/v2/teams")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"key": "platform"})),
                Matcher::Regex(
                    r#""permissionGrants":\[\{"actionSet":"maintainTeam","memberIDs":\["a"\]\}\]"#
                        .to_string(),
                ),
            ]))
            .with_status(201)
            .with_body(json!({"key": "platform", "name": "Platform"}).to_string())
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/teams/platform")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "key": "platform",
                    "name": "Platform",
                    "maintainers": {"items": [{"_id": "a"}]}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _members = server
            .mock("GET", "/api/v2/members")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"items": [{"_id": "a"}], "_links": {}}).to_string())
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let state = TeamResource
            .create(&session, &team("Platform", &["a"], &["a"]))
            .await
            .unwrap();
        post.assert_async().await;

        let attrs = Attrs::of(&state);
        assert_eq!(attrs.strings("member_ids"), vec!["a"]);
        assert_eq!(attrs.strings("maintainers"), vec!["a"]);
        assert!(attrs.strings("custom_role_keys").is_empty());
    }

    #[tokio::test]
    async fn unchanged_team_sends_no_patch() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/api/v2/teams/platform")
            .expect(0)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/teams/platform")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"key": "platform", "name": "Platform"}).to_string())
            .create_async()
            .await;
        let _members = server
            .mock("GET", "/api/v2/members")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"items": []}).to_string())
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let value = team("Platform", &[], &[]);
        TeamResource.update(&session, &value, &value).await.unwrap();
        patch.assert_async().await;
    }
}
