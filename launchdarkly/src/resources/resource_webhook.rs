use super::attributes::{id, optional_string, policy_statements, tags};
use super::error::{rollback_on_error, ApiContext, ResourceError};
use super::managed::{key_or_id, read_back, seeded, Orchestrator};
use crate::api::common::{patch_remove, patch_replace, PatchOperation};
use crate::api::webhooks::{Webhook, WebhookPost};
use crate::convert::policy::{statements_from_config, statements_to_config};
use crate::convert::{string_list, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

pub fn webhook_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages a webhook that receives change events")
        .attribute(id())
        .attribute(
            AttributeBuilder::new("url", AttributeType::String)
                .description("URL of the receiving endpoint")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("secret", AttributeType::String)
                .description("Secret used to sign requests")
                .optional()
                .sensitive()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("on", AttributeType::Bool)
                .description("Whether the webhook is enabled")
                .required()
                .build(),
        )
        .attribute(optional_string("name", "Display name"))
        .attribute(tags())
        .block(policy_statements("statements"))
        .build()
}

/// The API never echoes a secret back, so the known one is carried over.
pub fn webhook_to_state(webhook: &Webhook, known_secret: Option<String>) -> Dynamic {
    let mut fields = vec![
        ("id", Dynamic::from(webhook.id.as_str())),
        ("url", Dynamic::from(webhook.url.as_str())),
        ("secret", Dynamic::from(webhook.secret.clone().or(known_secret))),
        ("on", Dynamic::from(webhook.on)),
        ("name", Dynamic::from(webhook.name.clone())),
        ("tags", string_list(&webhook.tags)),
    ];
    if let Some(statements) = &webhook.statements {
        fields.push(("statements", statements_to_config(statements)));
    }
    Dynamic::object(fields)
}

fn base_patches(attrs: Attrs<'_>) -> Vec<PatchOperation> {
    vec![
        patch_replace("/url", attrs.str_or_empty("url")),
        patch_replace("/secret", attrs.str_or_empty("secret")),
        patch_replace("/on", attrs.bool_or("on", false)),
        patch_replace("/name", attrs.str_or_empty("name")),
        patch_replace("/tags", attrs.strings("tags")),
    ]
}

/// Statements are replaced when set and removed once the last one is
/// dropped from configuration.
fn statement_patch(prior: Attrs<'_>, config: Attrs<'_>) -> Result<Option<PatchOperation>, ConvertError> {
    let statements = statements_from_config(config.list("statements"))?;
    if !statements.is_empty() {
        Ok(Some(patch_replace("/statements", statements)))
    } else if !prior.list("statements").is_empty() {
        Ok(Some(patch_remove("/statements")))
    } else {
        Ok(None)
    }
}

#[derive(Default)]
pub struct WebhookResource;

#[async_trait]
impl Orchestrator for WebhookResource {
    const TYPE_NAME: &'static str = "launchdarkly_webhook";
    const NOUN: &'static str = "webhook";

    fn schema() -> Schema {
        webhook_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        statements_from_config(Attrs::of(config).list("statements")).map(drop)
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        if id.is_empty() {
            return Err(ConvertError::validation("webhook import ID must not be empty"));
        }
        Ok(Vec::new())
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let secret = attrs.non_empty("secret");
        let post = WebhookPost {
            url: attrs.str_or_empty("url"),
            sign: secret.is_some(),
            secret,
            on: attrs.bool_or("on", false),
            name: attrs.non_empty("name"),
            tags: attrs.strings("tags"),
            statements: statements_from_config(attrs.list("statements"))?,
        };
        let webhook = client
            .webhooks()
            .create(&post)
            .await
            .during("create", Self::NOUN, &post.url)?;
        let id = webhook.id;

        let settings = client
            .webhooks()
            .patch(&id, &base_patches(attrs))
            .await
            .during("update", Self::NOUN, &id)
            .map(drop);
        rollback_on_error(settings, Self::NOUN, &id, client.webhooks().delete(&id)).await?;

        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let attrs = Attrs::of(state);
        let id = attrs.str_or_empty("id");
        Ok(session
            .client
            .webhooks()
            .get(&id)
            .await
            .absent_during("read", Self::NOUN, &id)?
            .map(|webhook| DynamicValue::new(webhook_to_state(&webhook, attrs.non_empty("secret")))))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        let id = key_or_id(Attrs::of(prior), "id");
        let mut patches = base_patches(attrs);
        patches.extend(statement_patch(Attrs::of(prior), attrs)?);
        session
            .client
            .webhooks()
            .patch(&id, &patches)
            .await
            .during("update", Self::NOUN, &id)?;
        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let id = key_or_id(Attrs::of(prior), "id");
        session
            .client
            .webhooks()
            .delete(&id)
            .await
            .during("delete", Self::NOUN, &id)
    }
}
