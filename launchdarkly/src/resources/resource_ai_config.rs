use super::attributes::{id, key, maintainer_id, optional_string, required_string, tags};
use super::error::{ApiContext, ResourceError};
use super::managed::{read_back, seeded, Orchestrator};
use crate::api::ai_configs::{AiConfig, AiConfigPatch, AiConfigPost};
use crate::convert::ids::AI_CONFIG_ID;
use crate::convert::{string_list, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

pub fn ai_config_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages an AI config in a project")
        .attribute(id())
        .attribute(key("project_key", "Key of the project"))
        .attribute(key("key", "Project-unique key of the AI config"))
        .attribute(required_string("name", "Display name"))
        .attribute(optional_string("description", "Description"))
        .attribute(tags())
        .attribute(maintainer_id())
        .attribute(
            AttributeBuilder::new("maintainer_team_key", AttributeType::String)
                .description("Key of the team that maintains the AI config")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("version", AttributeType::Number)
                .description("Version number of the AI config")
                .computed()
                .build(),
        )
        .build()
}

fn ai_config_keys(attrs: Attrs<'_>) -> Result<(String, String), ConvertError> {
    match (attrs.non_empty("project_key"), attrs.non_empty("key")) {
        (Some(project_key), Some(key)) => Ok((project_key, key)),
        _ => {
            let id = attrs.str_or_empty("id");
            let parts = AI_CONFIG_ID.parse(&id)?;
            Ok((parts[0].to_string(), parts[1].to_string()))
        }
    }
}

fn check_maintainer(attrs: Attrs<'_>) -> Result<(), ConvertError> {
    if attrs.non_empty("maintainer_id").is_some() && attrs.non_empty("maintainer_team_key").is_some() {
        return Err(ConvertError::validation(
            "only one of maintainer_id and maintainer_team_key may be set",
        ));
    }
    Ok(())
}

pub fn ai_config_to_state(project_key: &str, config: &AiConfig) -> Dynamic {
    let maintainer = config.maintainer.as_ref();
    Dynamic::object([
        ("id", Dynamic::from(AI_CONFIG_ID.join(&[project_key, config.key.as_str()]))),
        ("project_key", Dynamic::from(project_key)),
        ("key", Dynamic::from(config.key.as_str())),
        ("name", Dynamic::from(config.name.as_str())),
        ("description", Dynamic::from(config.description.as_str())),
        ("tags", string_list(&config.tags)),
        ("maintainer_id", Dynamic::from(maintainer.and_then(|m| m.id.clone()))),
        ("maintainer_team_key", Dynamic::from(maintainer.and_then(|m| m.key.clone()))),
        ("version", Dynamic::from(config.version)),
    ])
}

#[derive(Default)]
pub struct AiConfigResource;

#[async_trait]
impl Orchestrator for AiConfigResource {
    const TYPE_NAME: &'static str = "launchdarkly_ai_config";
    const NOUN: &'static str = "AI config";

    fn schema() -> Schema {
        ai_config_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        check_maintainer(Attrs::of(config))
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = AI_CONFIG_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("project_key"), parts[0].to_string()),
            (AttributePath::new("key"), parts[1].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        check_maintainer(attrs)?;
        let (project_key, key) = ai_config_keys(attrs)?;
        let id = AI_CONFIG_ID.join(&[&project_key, &key]);
        let post = AiConfigPost {
            key,
            name: attrs.str_or_empty("name"),
            description: attrs.str_or_empty("description"),
            tags: attrs.strings("tags"),
            maintainer_id: attrs.non_empty("maintainer_id"),
            maintainer_team_key: attrs.non_empty("maintainer_team_key"),
        };
        session
            .client
            .ai_configs()
            .create(&project_key, &post)
            .await
            .during("create", Self::NOUN, &id)?;
        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let (project_key, key) = ai_config_keys(Attrs::of(state))?;
        let id = AI_CONFIG_ID.join(&[&project_key, &key]);
        Ok(session
            .client
            .ai_configs()
            .get(&project_key, &key)
            .await
            .absent_during("read", Self::NOUN, &id)?
            .map(|config| DynamicValue::new(ai_config_to_state(&project_key, &config))))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        check_maintainer(attrs)?;
        let (project_key, key) = ai_config_keys(Attrs::of(prior))?;
        let id = AI_CONFIG_ID.join(&[&project_key, &key]);
        let patch = AiConfigPatch {
            name: Some(attrs.str_or_empty("name")),
            description: Some(attrs.str_or_empty("description")),
            tags: Some(attrs.strings("tags")),
            maintainer_id: attrs.non_empty("maintainer_id"),
            maintainer_team_key: attrs.non_empty("maintainer_team_key"),
        };
        session
            .client
            .ai_configs()
            .patch(&project_key, &key, &patch)
            .await
            .during("update", Self::NOUN, &id)?;
        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let (project_key, key) = ai_config_keys(Attrs::of(prior))?;
        session
            .client
            .ai_configs()
            .delete(&project_key, &key)
            .await
            .during("delete", Self::NOUN, &AI_CONFIG_ID.join(&[&project_key, &key]))
    }
}
