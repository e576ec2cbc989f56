use super::attributes::{id, policy_statements, required_string, tags};
use super::error::{ApiContext, ResourceError};
use super::managed::{read_back, seeded, Orchestrator};
use crate::api::audit_log_subscriptions::{AuditLogSubscription, AuditLogSubscriptionPost};
use crate::api::common::patch_replace;
use crate::convert::ids::AUDIT_LOG_SUBSCRIPTION_ID;
use crate::convert::integration_config::IntegrationRegistry;
use crate::convert::policy::{statements_from_config, statements_to_config};
use crate::convert::{string_list, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub fn audit_log_subscription_schema() -> Schema {
    let registry = IntegrationRegistry::builtin();
    SchemaBuilder::new()
        .description("Manages an audit log subscription that forwards changes to an integration")
        .attribute(id())
        .attribute(
            AttributeBuilder::new("integration_key", AttributeType::String)
                .description("Integration receiving the audit log events")
                .required()
                .force_new()
                .validator(StringOneOfValidator::new(registry.keys()))
                .build(),
        )
        .attribute(required_string("name", "Display name"))
        .attribute(
            AttributeBuilder::new("config", AttributeType::map_of(AttributeType::String))
                .description("Integration-specific settings, keyed in snake_case")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("on", AttributeType::Bool)
                .description("Whether the subscription is active")
                .required()
                .build(),
        )
        .attribute(tags())
        .block(policy_statements("statements").min_items(1))
        .build()
}

/// Integration key and subscription ID. A lookup names them separately.
fn subscription_keys(attrs: Attrs<'_>) -> Result<(String, String), ConvertError> {
    let id = attrs.str_or_empty("id");
    if let (false, Some(integration_key)) = (id.contains('/'), attrs.non_empty("integration_key")) {
        if !id.is_empty() {
            return Ok((integration_key, id));
        }
    }
    let parts = AUDIT_LOG_SUBSCRIPTION_ID.parse(&id)?;
    Ok((parts[0].to_string(), parts[1].to_string()))
}

fn string_map_to_dynamic(map: BTreeMap<String, String>) -> Dynamic {
    Dynamic::Map(map.into_iter().map(|(k, v)| (k, Dynamic::from(v))).collect())
}

/// `prior_config` decides which keys are reported and supplies secrets
/// the API masks; lookups report every key.
pub fn audit_log_subscription_to_state(
    registry: &IntegrationRegistry,
    integration_key: &str,
    subscription: &AuditLogSubscription,
    prior_config: &BTreeMap<String, String>,
    is_lookup: bool,
) -> Result<Dynamic, ConvertError> {
    let config = registry.config_to_user(integration_key, &subscription.config, prior_config, is_lookup)?;
    Ok(Dynamic::object([
        (
            "id",
            Dynamic::from(AUDIT_LOG_SUBSCRIPTION_ID.join(&[integration_key, subscription.id.as_str()])),
        ),
        ("integration_key", Dynamic::from(integration_key)),
        ("name", Dynamic::from(subscription.name.as_str())),
        ("config", string_map_to_dynamic(config)),
        ("on", Dynamic::from(subscription.on)),
        ("tags", string_list(&subscription.tags)),
        ("statements", statements_to_config(&subscription.statements)),
    ]))
}

#[derive(Default)]
pub struct AuditLogSubscriptionResource;

#[async_trait]
impl Orchestrator for AuditLogSubscriptionResource {
    const TYPE_NAME: &'static str = "launchdarkly_audit_log_subscription";
    const NOUN: &'static str = "audit log subscription";

    fn schema() -> Schema {
        audit_log_subscription_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        let attrs = Attrs::of(config);
        statements_from_config(attrs.list("statements"))?;
        // Unknown values are only checked once the plan is applied.
        if !attrs.get("config").is_known() || !attrs.get("integration_key").is_known() {
            return Ok(());
        }
        IntegrationRegistry::builtin()
            .config_from_user(&attrs.str_or_empty("integration_key"), &attrs.string_map("config"))
            .map(drop)
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = AUDIT_LOG_SUBSCRIPTION_ID.parse(id)?;
        Ok(vec![(AttributePath::new("integration_key"), parts[0].to_string())])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        let integration_key = attrs.str_or_empty("integration_key");
        let post = AuditLogSubscriptionPost {
            name: attrs.str_or_empty("name"),
            config: session
                .integrations
                .config_from_user(&integration_key, &attrs.string_map("config"))?,
            statements: statements_from_config(attrs.list("statements"))?,
            on: attrs.bool_or("on", false),
            tags: attrs.strings("tags"),
        };
        let subscription = session
            .client
            .audit_log_subscriptions()
            .create(&integration_key, &post)
            .await
            .during("create", Self::NOUN, &integration_key)?;

        let id = AUDIT_LOG_SUBSCRIPTION_ID.join(&[&integration_key, &subscription.id]);
        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let attrs = Attrs::of(state);
        let (integration_key, id) = subscription_keys(attrs)?;
        let full_id = AUDIT_LOG_SUBSCRIPTION_ID.join(&[&integration_key, &id]);
        let Some(subscription) = session
            .client
            .audit_log_subscriptions()
            .get(&integration_key, &id)
            .await
            .absent_during("read", Self::NOUN, &full_id)?
        else {
            return Ok(None);
        };
        // Imported state carries no config yet, so every key is reported.
        let is_lookup = !attrs.is_set("config");
        let value = audit_log_subscription_to_state(
            &session.integrations,
            &integration_key,
            &subscription,
            &attrs.string_map("config"),
            is_lookup,
        )?;
        Ok(Some(DynamicValue::new(value)))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        let (integration_key, id) = subscription_keys(Attrs::of(prior))?;
        let full_id = AUDIT_LOG_SUBSCRIPTION_ID.join(&[&integration_key, &id]);
        let api_config = session
            .integrations
            .config_from_user(&integration_key, &attrs.string_map("config"))?;
        let patches = vec![
            patch_replace("/name", attrs.str_or_empty("name")),
            patch_replace("/tags", attrs.strings("tags")),
            patch_replace("/config", api_config),
            patch_replace("/on", attrs.bool_or("on", false)),
            patch_replace("/statements", statements_from_config(attrs.list("statements"))?),
        ];
        session
            .client
            .audit_log_subscriptions()
            .patch(&integration_key, &id, &patches)
            .await
            .during("update", Self::NOUN, &full_id)?;
        read_back(self, session, &seeded(config, &full_id), "update", &full_id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let (integration_key, id) = subscription_keys(Attrs::of(prior))?;
        session
            .client
            .audit_log_subscriptions()
            .delete(&integration_key, &id)
            .await
            .during(
                "delete",
                Self::NOUN,
                &AUDIT_LOG_SUBSCRIPTION_ID.join(&[&integration_key, &id]),
            )
    }
}
