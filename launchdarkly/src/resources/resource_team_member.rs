use super::attributes::{id, optional_string, string_set_attr};
use super::error::{ApiContext, ResourceError};
use super::managed::{read_back, seeded, Orchestrator};
use crate::api::common::patch_replace;
use crate::api::members::{Member, MemberPost};
use crate::api::Client;
use crate::convert::{string_list, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const BUILT_IN_ROLES: [&str; 4] = ["reader", "writer", "admin", "no_access"];

pub fn team_member_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages an account member. Creating one sends an invitation email.")
        .attribute(id())
        .attribute(
            AttributeBuilder::new("email", AttributeType::String)
                .description("Email address of the member")
                .required()
                .force_new()
                .build(),
        )
        .attribute(optional_string("first_name", "First name"))
        .attribute(optional_string("last_name", "Last name"))
        .attribute(
            AttributeBuilder::new("role", AttributeType::String)
                .description("Built-in role of the member")
                .optional()
                .computed()
                .validator(StringOneOfValidator::new(BUILT_IN_ROLES))
                .build(),
        )
        .attribute(string_set_attr("custom_roles", "Keys of custom roles assigned to the member"))
        .build()
}

/// The API stores custom roles by ID; configuration names them by key.
async fn custom_role_ids(client: &Client, keys: &[String]) -> Result<Vec<String>, ResourceError> {
    let mut ids = Vec::with_capacity(keys.len());
    for key in keys {
        let role = client
            .custom_roles()
            .get(key)
            .await
            .during("read", "custom role", key)?;
        ids.push(role.id);
    }
    Ok(ids)
}

async fn custom_role_keys(client: &Client, ids: &[String]) -> Result<Vec<String>, ResourceError> {
    let mut keys = Vec::with_capacity(ids.len());
    for id in ids {
        let role = client
            .custom_roles()
            .get(id)
            .await
            .during("read", "custom role", id)?;
        keys.push(role.key);
    }
    Ok(keys)
}

async fn member_to_state(client: &Client, member: &Member) -> Result<Dynamic, ResourceError> {
    let mut roles = custom_role_keys(client, &member.custom_roles).await?;
    roles.sort();
    Ok(Dynamic::object([
        ("id", Dynamic::from(member.id.as_str())),
        ("email", Dynamic::from(member.email.as_str())),
        ("first_name", Dynamic::from(member.first_name.as_str())),
        ("last_name", Dynamic::from(member.last_name.as_str())),
        ("role", Dynamic::from(member.role.as_str())),
        ("custom_roles", string_list(&roles)),
    ]))
}

#[derive(Default)]
pub struct TeamMemberResource;

#[async_trait]
impl Orchestrator for TeamMemberResource {
    const TYPE_NAME: &'static str = "launchdarkly_team_member";
    const NOUN: &'static str = "team member";

    fn schema() -> Schema {
        team_member_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        let attrs = Attrs::of(config);
        if !attrs.get("role").is_known() || !attrs.get("custom_roles").is_known() {
            return Ok(());
        }
        if !attrs.is_set("role") && attrs.list("custom_roles").is_empty() {
            return Err(ConvertError::validation(
                "team member must have either a role or custom_roles",
            ));
        }
        Ok(())
    }

    fn import(_id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        Ok(vec![])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let email = attrs.str_or_empty("email");
        let post = MemberPost {
            email: email.clone(),
            first_name: attrs.str_or_empty("first_name"),
            last_name: attrs.str_or_empty("last_name"),
            role: attrs.non_empty("role"),
            custom_roles: custom_role_ids(client, &attrs.strings("custom_roles")).await?,
        };
        let member = client
            .members()
            .create(&post)
            .await
            .during("create", Self::NOUN, &email)?;
        read_back(self, session, &seeded(config, &member.id), "create", &member.id).await
    }

    /// Reads by ID, or by email when the state only carries that.
    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(state);
        let member = match attrs.non_empty("id") {
            Some(id) => client
                .members()
                .get(&id)
                .await
                .absent_during("read", Self::NOUN, &id)?,
            None => {
                let email = attrs.str_or_empty("email");
                client
                    .members()
                    .find_by_email(&email)
                    .await
                    .during("read", Self::NOUN, &email)?
            }
        };
        let Some(member) = member else {
            return Ok(None);
        };
        Ok(Some(DynamicValue::new(member_to_state(client, &member).await?)))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let id = Attrs::of(prior).str_or_empty("id");
        let attrs = Attrs::of(config);
        let mut patches = vec![
            patch_replace("/firstName", attrs.str_or_empty("first_name")),
            patch_replace("/lastName", attrs.str_or_empty("last_name")),
        ];
        if let Some(role) = attrs.non_empty("role") {
            patches.push(patch_replace("/role", role));
        }
        patches.push(patch_replace(
            "/customRoles",
            custom_role_ids(client, &attrs.strings("custom_roles")).await?,
        ));
        client
            .members()
            .patch(&id, &patches)
            .await
            .during("update", Self::NOUN, &id)?;
        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let id = Attrs::of(prior).str_or_empty("id");
        session
            .client
            .members()
            .delete(&id)
            .await
            .during("delete", Self::NOUN, &id)
    }
}
