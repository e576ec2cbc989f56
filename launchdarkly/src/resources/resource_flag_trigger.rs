use super::attributes::{computed_secret, id, key, maintainer_id};
use super::error::{rollback_on_error, ApiContext, ResourceError};
use super::managed::{read_back, seeded, Orchestrator};
use crate::api::triggers::{
    action_instruction, enabled_instruction, replace_action_instruction, Trigger, TriggerPost,
    TRIGGER_INTEGRATIONS,
};
use crate::convert::ids::TRIGGER_ID;
use crate::convert::{Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use serde_json::Value;
use tfplug::schema::{AttributeBuilder, AttributeType, BlockBuilder, NestedBlock, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const TRIGGER_ACTIONS: [&str; 2] = ["turnFlagOn", "turnFlagOff"];

pub fn flag_trigger_schema() -> Schema {
    let instructions = BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("kind", AttributeType::String)
                .description("Action taken on the flag when the trigger fires")
                .required()
                .validator(StringOneOfValidator::new(TRIGGER_ACTIONS))
                .build(),
        )
        .build();

    SchemaBuilder::new()
        .description("Manages a flag trigger fired by an external integration")
        .attribute(id())
        .attribute(key("project_key", "Key of the project"))
        .attribute(key("env_key", "Key of the environment"))
        .attribute(key("flag_key", "Key of the flag"))
        .attribute(
            AttributeBuilder::new("integration_key", AttributeType::String)
                .description("Integration that fires the trigger")
                .required()
                .force_new()
                .validator(StringOneOfValidator::new(TRIGGER_INTEGRATIONS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("enabled", AttributeType::Bool)
                .description("Whether the trigger is active")
                .required()
                .build(),
        )
        .attribute(computed_secret("trigger_url", "Unique URL that fires the trigger"))
        .attribute(maintainer_id())
        .block(NestedBlock::list("instructions", instructions).min_items(1).max_items(1))
        .build()
}

/// Identity of a trigger. The state `id` is the bare trigger ID, while an
/// import ID carries all four parts.
struct TriggerKeys {
    project_key: String,
    env_key: String,
    flag_key: String,
    id: String,
}

impl TriggerKeys {
    fn of(attrs: Attrs<'_>) -> Result<Self, ConvertError> {
        let id = attrs.str_or_empty("id");
        if id.contains('/') {
            let parts = TRIGGER_ID.parse(&id)?;
            return Ok(Self {
                project_key: parts[0].to_string(),
                env_key: parts[1].to_string(),
                flag_key: parts[2].to_string(),
                id: parts[3].to_string(),
            });
        }
        Ok(Self {
            project_key: attrs.str_or_empty("project_key"),
            env_key: attrs.str_or_empty("env_key"),
            flag_key: attrs.str_or_empty("flag_key"),
            id,
        })
    }

    fn full_id(&self) -> String {
        TRIGGER_ID.join(&[&self.project_key, &self.env_key, &self.flag_key, &self.id])
    }
}

fn configured_action(attrs: Attrs<'_>) -> String {
    attrs
        .blocks("instructions")
        .first()
        .map(|i| i.str_or_empty("kind"))
        .unwrap_or_default()
}

/// The trigger URL is only revealed at creation, so `known_url` carries it.
fn trigger_to_state(keys: &TriggerKeys, trigger: &Trigger, known_url: Option<String>) -> Dynamic {
    let instructions: Vec<Dynamic> = trigger
        .action()
        .map(|kind| Dynamic::object([("kind", Dynamic::from(kind))]))
        .into_iter()
        .collect();
    Dynamic::object([
        ("id", Dynamic::from(trigger.id.as_str())),
        ("project_key", Dynamic::from(keys.project_key.as_str())),
        ("env_key", Dynamic::from(keys.env_key.as_str())),
        ("flag_key", Dynamic::from(keys.flag_key.as_str())),
        ("integration_key", Dynamic::from(trigger.integration_key.as_str())),
        ("enabled", Dynamic::from(trigger.enabled)),
        ("trigger_url", Dynamic::from(trigger.trigger_url.clone().or(known_url))),
        ("maintainer_id", Dynamic::from(trigger.maintainer_id.clone())),
        ("instructions", Dynamic::List(instructions)),
    ])
}

/// Looks up one trigger, `Ok(None)` when it is gone.
pub async fn read_trigger(
    session: &Session,
    attrs: Attrs<'_>,
    absent_ok: bool,
) -> Result<Option<Dynamic>, ResourceError> {
    let keys = TriggerKeys::of(attrs)?;
    let full_id = keys.full_id();
    let result = session
        .client
        .triggers()
        .get(&keys.project_key, &keys.flag_key, &keys.env_key, &keys.id)
        .await;
    let trigger = if absent_ok {
        result.absent_during("read", "flag trigger", &full_id)?
    } else {
        Some(result.during("read", "flag trigger", &full_id)?)
    };
    Ok(trigger.map(|t| trigger_to_state(&keys, &t, attrs.non_empty("trigger_url"))))
}

#[derive(Default)]
pub struct FlagTriggerResource;

#[async_trait]
impl Orchestrator for FlagTriggerResource {
    const TYPE_NAME: &'static str = "launchdarkly_flag_trigger";
    const NOUN: &'static str = "flag trigger";

    fn schema() -> Schema {
        flag_trigger_schema()
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = TRIGGER_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("project_key"), parts[0].to_string()),
            (AttributePath::new("env_key"), parts[1].to_string()),
            (AttributePath::new("flag_key"), parts[2].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let project_key = attrs.str_or_empty("project_key");
        let env_key = attrs.str_or_empty("env_key");
        let flag_key = attrs.str_or_empty("flag_key");
        let parent = TRIGGER_ID.join(&[&project_key, &env_key, &flag_key]);

        let post = TriggerPost {
            integration_key: attrs.str_or_empty("integration_key"),
            instructions: vec![action_instruction(&configured_action(attrs))],
        };
        let trigger = client
            .triggers()
            .create(&project_key, &flag_key, &env_key, &post)
            .await
            .during("create", Self::NOUN, &parent)?;

        // Triggers are always created enabled.
        if !attrs.bool_or("enabled", true) {
            let disabled = client
                .triggers()
                .update(&project_key, &flag_key, &env_key, &trigger.id, vec![enabled_instruction(false)])
                .await
                .during("update", Self::NOUN, &trigger.id)
                .map(drop);
            rollback_on_error(
                disabled,
                Self::NOUN,
                &trigger.id,
                client.triggers().delete(&project_key, &flag_key, &env_key, &trigger.id),
            )
            .await?;
        }

        let mut state = seeded(config, &trigger.id);
        if let (Dynamic::Map(fields), Some(url)) = (&mut state.value, trigger.trigger_url) {
            fields.insert("trigger_url".to_string(), Dynamic::from(url));
        }
        read_back(self, session, &state, "create", &trigger.id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        Ok(read_trigger(session, Attrs::of(state), true)
            .await?
            .map(DynamicValue::new))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let keys = TriggerKeys::of(Attrs::of(prior))?;
        let attrs = Attrs::of(config);
        let mut instructions: Vec<Value> = Vec::new();
        let action = configured_action(attrs);
        if action != configured_action(Attrs::of(prior)) {
            instructions.push(replace_action_instruction(&action));
        }
        let enabled = attrs.bool_or("enabled", true);
        if Attrs::of(prior).bool("enabled") != Some(enabled) {
            instructions.push(enabled_instruction(enabled));
        }
        if !instructions.is_empty() {
            session
                .client
                .triggers()
                .update(&keys.project_key, &keys.flag_key, &keys.env_key, &keys.id, instructions)
                .await
                .during("update", Self::NOUN, &keys.full_id())?;
        }

        let mut state = seeded(config, &keys.id);
        if let (Dynamic::Map(fields), Some(url)) = (&mut state.value, Attrs::of(prior).non_empty("trigger_url")) {
            fields.insert("trigger_url".to_string(), Dynamic::from(url));
        }
        read_back(self, session, &state, "update", &keys.full_id()).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let keys = TriggerKeys::of(Attrs::of(prior))?;
        session
            .client
            .triggers()
            .delete(&keys.project_key, &keys.flag_key, &keys.env_key, &keys.id)
            .await
            .during("delete", Self::NOUN, &keys.full_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_session;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn config(kind: &str, enabled: bool) -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("project_key", Dynamic::from("web")),
            ("env_key", Dynamic::from("production")),
            ("flag_key", Dynamic::from("checkout")),
            ("integration_key", Dynamic::from("datadog")),
            ("enabled", Dynamic::from(enabled)),
            (
                "instructions",
                Dynamic::List(vec![Dynamic::object([("kind", Dynamic::from(kind))])]),
            ),
        ]))
    }

    fn trigger_body(enabled: bool, url: Option<&str>) -> String {
        let mut body = json!({
            "_id": "t1",
            "_integrationKey": "datadog",
            "instructions": [{"kind": "turnFlagOff"}],
            "enabled": enabled
        });
        if let Some(url) = url {
            body["triggerURL"] = json!(url);
        }
        body.to_string()
    }

    #[tokio::test]
    async fn disabled_trigger_is_created_then_disabled() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", "/api/v2/flags/web/checkout/triggers/production")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"integrationKey": "datadog"})),
                Matcher::Regex(r#""instructions":\[\{"kind":"turnFlagOff"\}\]"#.to_string()),
            ]))
            .with_status(201)
            .with_body(trigger_body(true, Some("https://app.launchdarkly.com/webhook/triggers/t1/secret")))
            .create_async()
            .await;
        let disable = server
            .mock("PATCH", "/api/v2/flags/web/checkout/triggers/production/t1")
            .match_body(Matcher::Regex(r#""kind":"disableTrigger""#.to_string()))
            .with_status(200)
            .with_body(trigger_body(false, None))
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/flags/web/checkout/triggers/production/t1")
            .with_status(200)
            .with_body(trigger_body(false, None))
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let state = FlagTriggerResource
            .create(&session, &config("turnFlagOff", false))
            .await
            .unwrap();
        post.assert_async().await;
        disable.assert_async().await;

        let attrs = Attrs::of(&state);
        assert_eq!(attrs.string("id").as_deref(), Some("t1"));
        assert_eq!(attrs.bool("enabled"), Some(false));
        assert_eq!(
            attrs.string("trigger_url").as_deref(),
            Some("https://app.launchdarkly.com/webhook/triggers/t1/secret")
        );
    }

    #[tokio::test]
    async fn changed_action_is_replaced() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/api/v2/flags/web/checkout/triggers/production/t1")
            .match_body(Matcher::Regex(
                r#""kind":"replaceTriggerActionInstructions","value":\[\{"kind":"turnFlagOff"\}\]"#.to_string(),
            ))
            .with_status(200)
            .with_body(trigger_body(true, None))
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/flags/web/checkout/triggers/production/t1")
            .with_status(200)
            .with_body(trigger_body(true, None))
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let mut prior = config("turnFlagOn", true);
        if let Dynamic::Map(fields) = &mut prior.value {
            fields.insert("id".to_string(), Dynamic::from("t1"));
        }
        FlagTriggerResource
            .update(&session, &prior, &config("turnFlagOff", true))
            .await
            .unwrap();
        patch.assert_async().await;
    }

    #[test]
    fn import_id_resolves_to_trigger_id() {
        let state = Dynamic::object([("id", Dynamic::from("web/production/checkout/t1"))]);
        let keys = TriggerKeys::of(Attrs::new(&state)).unwrap();
        assert_eq!(keys.id, "t1");
        assert_eq!(keys.flag_key, "checkout");
        assert!(FlagTriggerResource::import("web/production/checkout").is_err());
    }
}
