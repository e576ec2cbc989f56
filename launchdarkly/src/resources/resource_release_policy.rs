use super::attributes::{id, key, required_string};
use super::error::{ApiContext, ResourceError};
use super::managed::{read_back, seeded, Orchestrator};
use crate::api::release_policies::{
    GuardedReleaseConfig, ReleasePolicy, ReleasePolicyScope, GUARDED_RELEASE, PROGRESSIVE_RELEASE,
};
use crate::convert::ids::RELEASE_POLICY_ID;
use crate::convert::{string_list, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{AttributeBuilder, AttributeType, BlockBuilder, NestedBlock, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, StringOneOfValidator};

pub fn release_policy_schema() -> Schema {
    let scope = BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("environment_keys", AttributeType::list_of(AttributeType::String))
                .description("Environments the policy applies to")
                .optional()
                .build(),
        )
        .build();
    let guarded = BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("rollback_on_regression", AttributeType::Bool)
                .description("Roll back automatically when a regression is detected")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("min_sample_size", AttributeType::Number)
                .description("Minimum number of samples before regressions are evaluated")
                .optional()
                .validator(NumberRangeValidator::new(Some(1.0), None))
                .build(),
        )
        .build();

    SchemaBuilder::new()
        .description("Manages a release policy in a project")
        .attribute(id())
        .attribute(key("project_key", "Key of the project"))
        .attribute(key("key", "Project-unique key of the policy"))
        .attribute(required_string("name", "Display name"))
        .attribute(
            AttributeBuilder::new("release_method", AttributeType::String)
                .description("Either guarded-release or progressive-release")
                .required()
                .validator(StringOneOfValidator::new([GUARDED_RELEASE, PROGRESSIVE_RELEASE]))
                .build(),
        )
        .block(NestedBlock::list("scope", scope).max_items(1))
        .block(NestedBlock::list("guarded_release_config", guarded).max_items(1))
        .build()
}

fn policy_keys(attrs: Attrs<'_>) -> Result<(String, String), ConvertError> {
    match (attrs.non_empty("project_key"), attrs.non_empty("key")) {
        (Some(project_key), Some(key)) => Ok((project_key, key)),
        _ => {
            let id = attrs.str_or_empty("id");
            let parts = RELEASE_POLICY_ID.parse(&id)?;
            Ok((parts[0].to_string(), parts[1].to_string()))
        }
    }
}

/// Guarded settings only apply to guarded releases.
pub fn release_policy_from_config(attrs: Attrs<'_>, key: String) -> Result<ReleasePolicy, ConvertError> {
    let release_method = attrs.str_or_empty("release_method");
    let guarded = attrs.block("guarded_release_config");
    if guarded.is_some() && release_method != GUARDED_RELEASE {
        return Err(ConvertError::validation(format!(
            "guarded_release_config can only be set when release_method is {:?}",
            GUARDED_RELEASE
        )));
    }
    Ok(ReleasePolicy {
        key,
        name: attrs.str_or_empty("name"),
        release_method,
        scope: attrs.block("scope").map(|scope| ReleasePolicyScope {
            environment_keys: scope.strings("environment_keys"),
        }),
        guarded_release_config: guarded.map(|g| GuardedReleaseConfig {
            rollback_on_regression: g.bool_or("rollback_on_regression", false),
            min_sample_size: g.int("min_sample_size"),
        }),
        ..Default::default()
    })
}

pub fn release_policy_to_state(project_key: &str, policy: &ReleasePolicy) -> Dynamic {
    let scope: Vec<Dynamic> = policy
        .scope
        .iter()
        .map(|s| Dynamic::object([("environment_keys", string_list(&s.environment_keys))]))
        .collect();
    let guarded: Vec<Dynamic> = policy
        .guarded_release_config
        .iter()
        .filter(|_| policy.release_method == GUARDED_RELEASE)
        .map(|g| {
            Dynamic::object([
                ("rollback_on_regression", Dynamic::from(g.rollback_on_regression)),
                (
                    "min_sample_size",
                    Dynamic::from(g.min_sample_size.filter(|n| *n > 0)),
                ),
            ])
        })
        .collect();
    Dynamic::object([
        (
            "id",
            Dynamic::from(RELEASE_POLICY_ID.join(&[project_key, policy.key.as_str()])),
        ),
        ("project_key", Dynamic::from(project_key)),
        ("key", Dynamic::from(policy.key.as_str())),
        ("name", Dynamic::from(policy.name.as_str())),
        ("release_method", Dynamic::from(policy.release_method.as_str())),
        ("scope", Dynamic::List(scope)),
        ("guarded_release_config", Dynamic::List(guarded)),
    ])
}

#[derive(Default)]
pub struct ReleasePolicyResource;

#[async_trait]
impl Orchestrator for ReleasePolicyResource {
    const TYPE_NAME: &'static str = "launchdarkly_release_policy";
    const NOUN: &'static str = "release policy";

    fn schema() -> Schema {
        release_policy_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        release_policy_from_config(Attrs::of(config), String::new()).map(drop)
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = RELEASE_POLICY_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("project_key"), parts[0].to_string()),
            (AttributePath::new("key"), parts[1].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let (project_key, key) = policy_keys(Attrs::of(config))?;
        let id = RELEASE_POLICY_ID.join(&[&project_key, &key]);
        let policy = release_policy_from_config(Attrs::of(config), key)?;
        session
            .client
            .release_policies()
            .create(&project_key, &policy)
            .await
            .during("create", Self::NOUN, &id)?;
        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let (project_key, key) = policy_keys(Attrs::of(state))?;
        let id = RELEASE_POLICY_ID.join(&[&project_key, &key]);
        Ok(session
            .client
            .release_policies()
            .get(&project_key, &key)
            .await
            .absent_during("read", Self::NOUN, &id)?
            .map(|policy| DynamicValue::new(release_policy_to_state(&project_key, &policy))))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let (project_key, key) = policy_keys(Attrs::of(prior))?;
        let id = RELEASE_POLICY_ID.join(&[&project_key, &key]);
        let policy = release_policy_from_config(Attrs::of(config), key.clone())?;
        session
            .client
            .release_policies()
            .replace(&project_key, &key, &policy)
            .await
            .during("update", Self::NOUN, &id)?;
        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let (project_key, key) = policy_keys(Attrs::of(prior))?;
        session
            .client
            .release_policies()
            .delete(&project_key, &key)
            .await
            .during("delete", Self::NOUN, &RELEASE_POLICY_ID.join(&[&project_key, &key]))
    }
}
