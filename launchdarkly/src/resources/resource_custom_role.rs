use super::attributes::{id, key, optional_string, policy_statements, required_string};
use super::error::{ApiContext, ResourceError};
use super::managed::{key_or_id, read_back, seeded, Orchestrator};
use crate::api::common::{patch_replace, PatchWithComment};
use crate::api::custom_roles::{CustomRole, CustomRolePost};
use crate::convert::policy::{statements_from_config, statements_to_config};
use crate::convert::{Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const BASE_PERMISSIONS: [&str; 2] = ["reader", "no_access"];

pub fn custom_role_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages a custom role")
        .attribute(id())
        .attribute(key("key", "Unique key of the role"))
        .attribute(required_string("name", "Display name"))
        .attribute(optional_string("description", "Description"))
        .attribute(
            AttributeBuilder::new("base_permissions", AttributeType::String)
                .description("Permissions granted before the policy applies")
                .default_value("reader")
                .validator(StringOneOfValidator::new(BASE_PERMISSIONS))
                .build(),
        )
        .block(policy_statements("policy_statements").min_items(1))
        .build()
}

pub fn custom_role_to_state(role: &CustomRole) -> Dynamic {
    Dynamic::object([
        ("id", Dynamic::from(role.key.as_str())),
        ("key", Dynamic::from(role.key.as_str())),
        ("name", Dynamic::from(role.name.as_str())),
        ("description", Dynamic::from(role.description.as_str())),
        (
            "base_permissions",
            Dynamic::from(role.base_permissions.as_deref().unwrap_or("reader")),
        ),
        ("policy_statements", statements_to_config(&role.policy)),
    ])
}

#[derive(Default)]
pub struct CustomRoleResource;

#[async_trait]
impl Orchestrator for CustomRoleResource {
    const TYPE_NAME: &'static str = "launchdarkly_custom_role";
    const NOUN: &'static str = "custom role";

    fn schema() -> Schema {
        custom_role_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        statements_from_config(Attrs::of(config).list("policy_statements")).map(drop)
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        if id.is_empty() {
            return Err(ConvertError::validation("custom role import ID must be the role key"));
        }
        Ok(vec![(AttributePath::new("key"), id.to_string())])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        let key = attrs.str_or_empty("key");
        let post = CustomRolePost {
            key: key.clone(),
            name: attrs.str_or_empty("name"),
            description: attrs.str_or_empty("description"),
            policy: statements_from_config(attrs.list("policy_statements"))?,
            base_permissions: attrs.non_empty("base_permissions"),
        };
        session
            .client
            .custom_roles()
            .create(&post)
            .await
            .during("create", Self::NOUN, &key)?;
        read_back(self, session, &seeded(config, &key), "create", &key).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let key = key_or_id(Attrs::of(state), "key");
        Ok(session
            .client
            .custom_roles()
            .get(&key)
            .await
            .absent_during("read", Self::NOUN, &key)?
            .map(|role| DynamicValue::new(custom_role_to_state(&role))))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        let key = key_or_id(Attrs::of(prior), "key");
        let mut patches = vec![
            patch_replace("/name", attrs.str_or_empty("name")),
            patch_replace("/description", attrs.str_or_empty("description")),
            patch_replace("/policy", statements_from_config(attrs.list("policy_statements"))?),
        ];
        if let Some(base) = attrs.non_empty("base_permissions") {
            patches.push(patch_replace("/basePermissions", base));
        }
        session
            .client
            .custom_roles()
            .patch(&key, &PatchWithComment::terraform(patches))
            .await
            .during("update", Self::NOUN, &key)?;
        read_back(self, session, &seeded(config, &key), "update", &key).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let key = key_or_id(Attrs::of(prior), "key");
        session
            .client
            .custom_roles()
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

    fn config(effect: &str) -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("key", Dynamic::from("flag-editor")),
            ("name", Dynamic::from("Flag editor")),
            ("base_permissions", Dynamic::from("no_access")),
            (
                "policy_statements",
                Dynamic::List(vec![Dynamic::object([
                    ("effect", Dynamic::from(effect)),
                    ("resources", Dynamic::string_list(["proj/*:env/*:flag/*"])),
                    ("actions", Dynamic::string_list(["*"])),
                ])]),
            ),
        ]))
    }

    fn role_body() -> String {
        json!({
            "_id": "r1",
            "key": "flag-editor",
            "name": "Flag editor",
            "basePermissions": "no_access",
            "policy": [{"effect": "allow", "resources": ["proj/*:env/*:flag/*"], "actions": ["*"]}]
        })
        .to_string()
    }

    #[test]
    fn invalid_effect_fails_validation() {
        assert!(CustomRoleResource::validate(&config("permit")).is_err());
        assert!(CustomRoleResource::validate(&config("deny")).is_ok());
    }

    #[tokio::test]
    async fn update_replaces_policy_and_base_permissions() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/api/v2/roles/flag-editor")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""path":"/policy""#.to_string()),
                Matcher::Regex(r#""path":"/basePermissions","value":"no_access""#.to_string()),
            ]))
            .with_status(200)
            .with_body(role_body())
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/roles/flag-editor")
            .with_status(200)
            .with_body(role_body())
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let state = CustomRoleResource
            .update(&session, &config("allow"), &config("allow"))
            .await
            .unwrap();
        patch.assert_async().await;

        let attrs = Attrs::of(&state);
        assert_eq!(attrs.string("base_permissions").as_deref(), Some("no_access"));
        let statement = attrs.blocks("policy_statements")[0];
        assert_eq!(statement.string("effect").as_deref(), Some("allow"));
    }
}
