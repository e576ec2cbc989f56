use super::attributes::{id, key, required_string};
use super::error::{ApiContext, ResourceError};
use super::managed::{read_back, require_environment, seeded, Orchestrator};
use crate::api::common::patch_replace;
use crate::api::destinations::{Destination, DestinationPost};
use crate::convert::destinations::{
    destination_config_from_user, destination_config_to_user, DESTINATION_KINDS,
};
use crate::convert::ids::DESTINATION_ID;
use crate::convert::{Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub fn destination_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages a data export destination receiving raw analytics events")
        .attribute(id())
        .attribute(key("project_key", "Key of the project"))
        .attribute(
            AttributeBuilder::new("env_key", AttributeType::String)
                .description("Key of the environment")
                .required()
                .force_new()
                .build(),
        )
        .attribute(required_string("name", "Display name"))
        .attribute(
            AttributeBuilder::new("kind", AttributeType::String)
                .description("Destination type")
                .required()
                .force_new()
                .validator(StringOneOfValidator::new(DESTINATION_KINDS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("config", AttributeType::map_of(AttributeType::String))
                .description("Destination-specific settings, keyed in snake_case")
                .required()
                .sensitive()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("on", AttributeType::Bool)
                .description("Whether the destination receives events")
                .optional()
                .build(),
        )
        .build()
}

struct DestinationKeys {
    project_key: String,
    env_key: String,
    id: String,
}

impl DestinationKeys {
    /// The destination ID is the last part of the state `id`; the parents
    /// come from their own attributes.
    fn of(attrs: Attrs<'_>) -> Result<Self, ConvertError> {
        let state_id = attrs.str_or_empty("id");
        let parts = DESTINATION_ID.parse(&state_id)?;
        Ok(Self {
            project_key: attrs
                .non_empty("project_key")
                .unwrap_or_else(|| parts[0].to_string()),
            env_key: attrs
                .non_empty("env_key")
                .unwrap_or_else(|| parts[1].to_string()),
            id: parts[2].to_string(),
        })
    }

    fn full_id(&self) -> String {
        DESTINATION_ID.join(&[&self.project_key, &self.env_key, &self.id])
    }
}

fn string_map_to_dynamic(map: BTreeMap<String, String>) -> Dynamic {
    Dynamic::Map(map.into_iter().map(|(k, v)| (k, Dynamic::from(v))).collect())
}

fn destination_to_state(
    keys: &DestinationKeys,
    destination: &Destination,
    prior_config: &BTreeMap<String, String>,
) -> Dynamic {
    let config = destination_config_to_user(&destination.kind, &destination.config, prior_config);
    Dynamic::object([
        ("id", Dynamic::from(keys.full_id())),
        ("project_key", Dynamic::from(keys.project_key.as_str())),
        ("env_key", Dynamic::from(keys.env_key.as_str())),
        ("name", Dynamic::from(destination.name.as_str())),
        ("kind", Dynamic::from(destination.kind.as_str())),
        ("config", string_map_to_dynamic(config)),
        ("on", Dynamic::from(destination.on)),
    ])
}

#[derive(Default)]
pub struct DestinationResource;

#[async_trait]
impl Orchestrator for DestinationResource {
    const TYPE_NAME: &'static str = "launchdarkly_destination";
    const NOUN: &'static str = "destination";

    fn schema() -> Schema {
        destination_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        let attrs = Attrs::of(config);
        if !attrs.get("config").is_known() || !attrs.get("kind").is_known() {
            return Ok(());
        }
        destination_config_from_user(&attrs.str_or_empty("kind"), &attrs.string_map("config")).map(drop)
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = DESTINATION_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("project_key"), parts[0].to_string()),
            (AttributePath::new("env_key"), parts[1].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let project_key = attrs.str_or_empty("project_key");
        let env_key = attrs.str_or_empty("env_key");
        let kind = attrs.str_or_empty("kind");
        require_environment(client, &project_key, &env_key).await?;

        let post = DestinationPost {
            name: attrs.str_or_empty("name"),
            config: destination_config_from_user(&kind, &attrs.string_map("config"))?,
            kind,
            on: attrs.bool_or("on", false),
        };
        let parent = format!("{}/{}", project_key, env_key);
        let destination = client
            .destinations()
            .create(&project_key, &env_key, &post)
            .await
            .during("create", Self::NOUN, &parent)?;

        let id = DESTINATION_ID.join(&[&project_key, &env_key, &destination.id]);
        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let attrs = Attrs::of(state);
        let keys = DestinationKeys::of(attrs)?;
        let Some(destination) = session
            .client
            .destinations()
            .get(&keys.project_key, &keys.env_key, &keys.id)
            .await
            .absent_during("read", Self::NOUN, &keys.full_id())?
        else {
            return Ok(None);
        };
        let value = destination_to_state(&keys, &destination, &attrs.string_map("config"));
        Ok(Some(DynamicValue::new(value)))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let keys = DestinationKeys::of(Attrs::of(prior))?;
        let attrs = Attrs::of(config);
        let kind = attrs.str_or_empty("kind");
        let patches = vec![
            patch_replace("/name", attrs.str_or_empty("name")),
            patch_replace("/kind", &kind),
            patch_replace("/on", attrs.bool_or("on", false)),
            patch_replace(
                "/config",
                destination_config_from_user(&kind, &attrs.string_map("config"))?,
            ),
        ];
        session
            .client
            .destinations()
            .patch(&keys.project_key, &keys.env_key, &keys.id, &patches)
            .await
            .during("update", Self::NOUN, &keys.full_id())?;
        read_back(self, session, &seeded(config, &keys.full_id()), "update", &keys.full_id()).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let keys = DestinationKeys::of(Attrs::of(prior))?;
        session
            .client
            .destinations()
            .delete(&keys.project_key, &keys.env_key, &keys.id)
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
    use std::collections::HashMap;

    fn config(kind: &str, entries: &[(&str, &str)]) -> DynamicValue {
        let map: HashMap<String, Dynamic> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), Dynamic::from(*v)))
            .collect();
        DynamicValue::new(Dynamic::object([
            ("project_key", Dynamic::from("web")),
            ("env_key", Dynamic::from("production")),
            ("name", Dynamic::from("Segment export")),
            ("kind", Dynamic::from(kind)),
            ("config", Dynamic::Map(map)),
            ("on", Dynamic::from(true)),
        ]))
    }

    fn segment_body() -> String {
        json!({
            "_id": "dest-1",
            "name": "Segment export",
            "kind": "segment",
            "config": {"writeKey": "****cret"},
            "on": true
        })
        .to_string()
    }

    #[test]
    fn validate_requires_kind_fields() {
        let err = DestinationResource::validate(&config("kinesis", &[("region", "us-east-1")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"missing required config field "role_arn" for destination kind "kinesis""#
        );
    }

    #[tokio::test]
    async fn create_keeps_configured_write_key() {
        let mut server = Server::new_async().await;
        let _project = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"key": "web", "name": "Web"}).to_string())
            .create_async()
            .await;
        let _env = server
            .mock("GET", "/api/v2/projects/web/environments/production")
            .with_status(200)
            .with_body(json!({"key": "production", "name": "Production"}).to_string())
            .create_async()
            .await;
        let post = server
            .mock("POST", "/api/v2/destinations/web/production")
            .match_body(Matcher::PartialJson(json!({
                "kind": "segment",
                "config": {"writeKey": "secret"}
            })))
            .with_status(201)
            .with_body(segment_body())
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/destinations/web/production/dest-1")
            .with_status(200)
            .with_body(segment_body())
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let state = DestinationResource
            .create(&session, &config("segment", &[("write_key", "secret")]))
            .await
            .unwrap();
        post.assert_async().await;

        let attrs = Attrs::of(&state);
        assert_eq!(attrs.string("id").as_deref(), Some("web/production/dest-1"));
        assert_eq!(
            attrs.string_map("config").get("write_key").map(String::as_str),
            Some("secret")
        );
    }

    #[tokio::test]
    async fn imported_destination_reads_from_id() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/api/v2/destinations/web/production/dest-1")
            .with_status(200)
            .with_body(segment_body())
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let seed = DynamicValue::new(Dynamic::object([("id", Dynamic::from("web/production/dest-1"))]));
        let state = DestinationResource.read(&session, &seed).await.unwrap().unwrap();
        let attrs = Attrs::of(&state);
        assert_eq!(attrs.string("kind").as_deref(), Some("segment"));
        assert_eq!(attrs.string("env_key").as_deref(), Some("production"));
        assert!(DestinationResource::import("web/dest-1").is_err());
    }

    #[tokio::test]
    async fn update_replaces_every_field() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/api/v2/destinations/web/production/dest-1")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""path":"/on","value":true"#.to_string()),
                Matcher::Regex(r#""path":"/config","value":\{"writeKey":"rotated"\}"#.to_string()),
            ]))
            .with_status(200)
            .with_body(segment_body())
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/destinations/web/production/dest-1")
            .with_status(200)
            .with_body(segment_body())
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let mut prior = config("segment", &[("write_key", "secret")]);
        if let Dynamic::Map(fields) = &mut prior.value {
            fields.insert("id".to_string(), Dynamic::from("web/production/dest-1"));
        }
        let state = DestinationResource
            .update(&session, &prior, &config("segment", &[("write_key", "rotated")]))
            .await
            .unwrap();
        patch.assert_async().await;
        assert_eq!(
            Attrs::of(&state).string_map("config").get("write_key").map(String::as_str),
            Some("rotated")
        );
    }
}
