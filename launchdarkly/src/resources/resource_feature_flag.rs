use super::attributes::{
    id, key, maintainer_id, optional_bool, optional_string, required_string, tags,
};
use super::error::{rollback_on_error, ApiContext, ResourceError};
use super::managed::{read_back, require_project, seeded, Orchestrator};
use crate::api::common::{patch_replace, ClientSideAvailability, PatchOperation, PatchWithComment};
use crate::api::flags::{Defaults, FeatureFlag, FeatureFlagPost, Variation};
use crate::convert::custom_properties::{
    custom_properties_from_config, custom_properties_to_config, custom_property_hash,
    MAX_CUSTOM_PROPERTIES, MAX_CUSTOM_PROPERTY_VALUES,
};
use crate::convert::ids::FLAG_ID;
use crate::convert::variations::{
    defaults_from_config, defaults_to_config, resolve_defaults, variation_patches,
    variations_from_config, variations_to_config, VariationType,
};
use crate::convert::{string_list as dynamic_strings, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use tfplug::schema::{AttributeBuilder, AttributeType, BlockBuilder, NestedBlock, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

fn variations_block() -> NestedBlock {
    NestedBlock::list(
        "variations",
        BlockBuilder::new()
            .attribute(required_string(
                "value",
                "Variation value, written as a string for every variation type",
            ))
            .attribute(optional_string("name", "Display name"))
            .attribute(optional_string("description", "Description"))
            .build(),
    )
}

fn defaults_block() -> NestedBlock {
    let index = |name: &str, description: &str| {
        AttributeBuilder::new(name, AttributeType::Number)
            .description(description)
            .required()
            .build()
    };
    NestedBlock::list(
        "defaults",
        BlockBuilder::new()
            .attribute(index("on_variation", "Index of the variation served when targeting is on"))
            .attribute(index("off_variation", "Index of the variation served when targeting is off"))
            .build(),
    )
    .max_items(1)
}

fn client_side_availability_block() -> NestedBlock {
    NestedBlock::list(
        "client_side_availability",
        BlockBuilder::new()
            .attribute(optional_bool(
                "using_environment_id",
                "Available to client-side SDKs using the client-side ID",
            ))
            .attribute(optional_bool(
                "using_mobile_key",
                "Available to mobile SDKs using the mobile key",
            ))
            .build(),
    )
    .max_items(1)
}

fn custom_properties_block() -> NestedBlock {
    NestedBlock::set(
        "custom_properties",
        BlockBuilder::new()
            .attribute(required_string("key", "Unique key of the property"))
            .attribute(required_string("name", "Display name of the property"))
            .attribute(
                AttributeBuilder::new("value", AttributeType::list_of(AttributeType::String))
                    .description("Property values")
                    .required()
                    .build(),
            )
            .build(),
    )
    .max_items(MAX_CUSTOM_PROPERTIES)
}

pub fn feature_flag_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages a feature flag")
        .attribute(id())
        .attribute(key("project_key", "Key of the project the flag belongs to"))
        .attribute(key("key", "Project-unique key of the flag"))
        .attribute(required_string("name", "Display name"))
        .attribute(optional_string("description", "Description"))
        .attribute(
            AttributeBuilder::new("variation_type", AttributeType::String)
                .description("One of `boolean`, `string`, `number` or `json`")
                .required()
                .force_new()
                .validator(StringOneOfValidator::new(VariationType::ALL))
                .build(),
        )
        .attribute(optional_bool("temporary", "Whether the flag is expected to be removed"))
        .attribute(tags())
        .attribute(optional_bool(
            "include_in_snippet",
            "Whether client-side SDKs using the client-side ID see the flag",
        ))
        .attribute(maintainer_id())
        .attribute(optional_string("maintainer_team_key", "Key of the maintaining team"))
        .attribute(optional_bool("archived", "Whether the flag is archived"))
        .block(variations_block())
        .block(defaults_block())
        .block(client_side_availability_block())
        .block(custom_properties_block())
        .build()
}

/// Flag and project key from state, or from the `id` seeded by import.
pub fn flag_keys(attrs: Attrs<'_>) -> Result<(String, String), ConvertError> {
    match (attrs.non_empty("project_key"), attrs.non_empty("key")) {
        (Some(project_key), Some(key)) => Ok((project_key, key)),
        _ => {
            let id = attrs.str_or_empty("id");
            let parts = FLAG_ID.parse(&id)?;
            Ok((parts[0].to_string(), parts[1].to_string()))
        }
    }
}

fn client_side_availability(attrs: Attrs<'_>) -> Option<ClientSideAvailability> {
    if let Some(block) = attrs.block("client_side_availability") {
        return Some(ClientSideAvailability {
            using_environment_id: block.bool_or("using_environment_id", false),
            using_mobile_key: block.bool_or("using_mobile_key", false),
        });
    }
    attrs
        .bool("include_in_snippet")
        .map(|using_environment_id| ClientSideAvailability {
            using_environment_id,
            using_mobile_key: false,
        })
}

/// Variations and defaults as configured, checked against each other.
fn configured_variations(attrs: Attrs<'_>) -> Result<(VariationType, Vec<Variation>, Defaults), ConvertError> {
    let variation_type = VariationType::parse(&attrs.str_or_empty("variation_type"))?;
    let variations = variations_from_config(attrs.list("variations"), variation_type)?;
    let defaults = resolve_defaults(&variations, variation_type, defaults_from_config(attrs)?)?;
    Ok((variation_type, variations, defaults))
}

fn check_custom_properties(attrs: Attrs<'_>) -> Result<(), ConvertError> {
    let mut seen = HashSet::new();
    for property in attrs.blocks("custom_properties") {
        if !seen.insert(custom_property_hash(property.raw())) {
            return Err(ConvertError::validation(format!(
                "custom property {:?} is declared more than once",
                property.str_or_empty("key")
            )));
        }
        let count = property.list("value").len();
        if count > MAX_CUSTOM_PROPERTY_VALUES {
            return Err(ConvertError::validation(format!(
                "custom property {:?} has {} values, at most {} are allowed",
                property.str_or_empty("key"),
                count,
                MAX_CUSTOM_PROPERTY_VALUES
            )));
        }
    }
    Ok(())
}

/// Everything the create body cannot carry, and everything an update
/// replaces apart from the variations.
fn settings_patches(attrs: Attrs<'_>) -> Vec<PatchOperation> {
    let mut patches = vec![
        patch_replace("/name", attrs.str_or_empty("name")),
        patch_replace("/description", attrs.str_or_empty("description")),
        patch_replace("/tags", attrs.strings("tags")),
        patch_replace("/temporary", attrs.bool_or("temporary", false)),
        patch_replace(
            "/customProperties",
            custom_properties_from_config(attrs.list("custom_properties")),
        ),
        patch_replace("/archived", attrs.bool_or("archived", false)),
    ];
    if let Some(availability) = client_side_availability(attrs) {
        patches.push(patch_replace("/clientSideAvailability", availability));
    }
    if let Some(maintainer) = attrs.non_empty("maintainer_id") {
        patches.push(patch_replace("/maintainerId", maintainer));
    } else if let Some(team) = attrs.non_empty("maintainer_team_key") {
        patches.push(patch_replace("/maintainerTeamKey", team));
    }
    patches
}

fn is_default_boolean_pair(variations: &[Variation]) -> bool {
    let plain = |v: &Variation, value: bool| {
        v.value == Value::Bool(value) && v.name.is_none() && v.description.is_none()
    };
    matches!(variations, [on, off] if plain(on, true) && plain(off, false))
}

/// `prior` supplies what the API cannot: the declared variation type and
/// which optional blocks the user wrote. A prior without a name is a fresh
/// import and gets everything.
pub fn flag_to_state(flag: &FeatureFlag, project_key: &str, prior: Attrs<'_>) -> Dynamic {
    let imported = !prior.is_set("name");
    let variation_type = prior
        .string("variation_type")
        .and_then(|vt| VariationType::parse(&vt).ok())
        .unwrap_or_else(|| VariationType::infer(&flag.variations));
    let implicit_variations = !imported
        && prior.list("variations").is_empty()
        && variation_type == VariationType::Boolean
        && is_default_boolean_pair(&flag.variations);
    let variations = if implicit_variations {
        Dynamic::List(vec![])
    } else {
        variations_to_config(&flag.variations, variation_type)
    };
    let include_in_snippet = flag
        .client_side_availability
        .map(|a| a.using_environment_id)
        .unwrap_or(flag.include_in_snippet);
    let availability = match flag.client_side_availability {
        Some(a) if imported || prior.block("client_side_availability").is_some() => {
            Dynamic::List(vec![Dynamic::object([
                ("using_environment_id", Dynamic::from(a.using_environment_id)),
                ("using_mobile_key", Dynamic::from(a.using_mobile_key)),
            ])])
        }
        _ => Dynamic::List(vec![]),
    };
    // Unconfigured defaults stay server-managed.
    let defaults = match &flag.defaults {
        Some(d) if imported || prior.block("defaults").is_some() => defaults_to_config(d),
        _ => Dynamic::List(vec![]),
    };

    Dynamic::object([
        ("id", Dynamic::from(FLAG_ID.join(&[project_key, flag.key.as_str()]))),
        ("project_key", Dynamic::from(project_key)),
        ("key", Dynamic::from(flag.key.as_str())),
        ("name", Dynamic::from(flag.name.as_str())),
        ("description", Dynamic::from(flag.description.as_str())),
        ("variation_type", Dynamic::from(variation_type.as_str())),
        ("variations", variations),
        ("defaults", defaults),
        ("temporary", Dynamic::from(flag.temporary)),
        ("tags", dynamic_strings(&flag.tags)),
        ("include_in_snippet", Dynamic::from(include_in_snippet)),
        ("client_side_availability", availability),
        ("maintainer_id", Dynamic::from(flag.maintainer_id.clone())),
        (
            "maintainer_team_key",
            Dynamic::from(flag.maintainer_team_key.clone()),
        ),
        (
            "custom_properties",
            custom_properties_to_config(&flag.custom_properties),
        ),
        ("archived", Dynamic::from(flag.archived)),
    ])
}

#[derive(Default)]
pub struct FeatureFlagResource;

#[async_trait]
impl Orchestrator for FeatureFlagResource {
    const TYPE_NAME: &'static str = "launchdarkly_feature_flag";
    const NOUN: &'static str = "feature flag";

    fn schema() -> Schema {
        feature_flag_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        let attrs = Attrs::of(config);
        check_custom_properties(attrs)?;
        let values_known = attrs
            .list("variations")
            .iter()
            .all(|v| Attrs::new(v).is_set("value"));
        if attrs.is_set("variation_type") && values_known {
            configured_variations(attrs)?;
        }
        Ok(())
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = FLAG_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("project_key"), parts[0].to_string()),
            (AttributePath::new("key"), parts[1].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let (project_key, key) = flag_keys(attrs)?;
        let id = FLAG_ID.join(&[&project_key, &key]);
        let (_, variations, defaults) = configured_variations(attrs)?;
        require_project(client, &project_key).await?;

        let post = FeatureFlagPost {
            key: key.clone(),
            name: attrs.str_or_empty("name"),
            description: attrs.str_or_empty("description"),
            variations,
            temporary: attrs.bool_or("temporary", false),
            tags: attrs.strings("tags"),
            defaults: Some(defaults),
            client_side_availability: client_side_availability(attrs),
        };
        client
            .flags()
            .create(&project_key, &post)
            .await
            .during("create", Self::NOUN, &id)?;

        let mut patches = settings_patches(attrs);
        patches.push(patch_replace("/defaults", defaults));
        let settings = client
            .flags()
            .patch(&project_key, &key, &PatchWithComment::terraform(patches))
            .await
            .during("update", Self::NOUN, &id)
            .map(drop);
        rollback_on_error(settings, Self::NOUN, &id, client.flags().delete(&project_key, &key)).await?;

        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let attrs = Attrs::of(state);
        let (project_key, key) = flag_keys(attrs)?;
        let id = FLAG_ID.join(&[&project_key, &key]);
        Ok(session
            .client
            .flags()
            .get(&project_key, &key)
            .await
            .absent_during("read", Self::NOUN, &id)?
            .map(|flag| DynamicValue::new(flag_to_state(&flag, &project_key, attrs))))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        let (project_key, key) = flag_keys(Attrs::of(prior))?;
        let id = FLAG_ID.join(&[&project_key, &key]);
        let (variation_type, variations, defaults) = configured_variations(attrs)?;
        let previous = variations_from_config(Attrs::of(prior).list("variations"), variation_type)?;

        let mut patches = settings_patches(attrs);
        patches.extend(variation_patches(&previous, &variations));
        if defaults_from_config(attrs)?.is_some() {
            patches.push(patch_replace("/defaults", defaults));
        }
        session
            .client
            .flags()
            .patch(&project_key, &key, &PatchWithComment::terraform(patches))
            .await
            .during("update", Self::NOUN, &id)?;

        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let (project_key, key) = flag_keys(Attrs::of(prior))?;
        session
            .client
            .flags()
            .delete(&project_key, &key)
            .await
            .during("delete", Self::NOUN, &FLAG_ID.join(&[&project_key, &key]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_session;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn variation(value: &str) -> Dynamic {
        Dynamic::object([("value", Dynamic::from(value))])
    }

    fn config(variation_type: &str, variations: Vec<Dynamic>) -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("project_key", Dynamic::from("web")),
            ("key", Dynamic::from("checkout")),
            ("name", Dynamic::from("Checkout")),
            ("variation_type", Dynamic::from(variation_type)),
            ("variations", Dynamic::List(variations)),
        ]))
    }

    fn flag_body(variations: Value) -> String {
        json!({
            "key": "checkout",
            "name": "Checkout",
            "kind": "multivariate",
            "variations": variations,
            "defaults": {"onVariation": 0, "offVariation": 1},
            "clientSideAvailability": {"usingEnvironmentId": false, "usingMobileKey": true},
            "customProperties": {},
            "tags": []
        })
        .to_string()
    }

    #[test]
    fn validate_rejects_single_string_variation() {
        let err = FeatureFlagResource::validate(&config("string", vec![variation("a")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "multivariate flags must have at least two variations defined"
        );
    }

    #[test]
    fn validate_rejects_out_of_range_defaults() {
        let mut value = config(
            "number",
            vec![variation("1"), variation("2"), variation("3"), variation("4")],
        );
        if let Dynamic::Map(fields) = &mut value.value {
            fields.insert(
                "defaults".to_string(),
                Dynamic::List(vec![Dynamic::object([
                    ("on_variation", Dynamic::from(5_i64)),
                    ("off_variation", Dynamic::from(0_i64)),
                ])]),
            );
        }
        let err = FeatureFlagResource::validate(&value).unwrap_err();
        assert_eq!(
            err,
            ConvertError::OutOfRange {
                field: "on_variation".to_string(),
                value: 5,
                max: 3
            }
        );
    }

    #[test]
    fn validate_rejects_repeated_custom_property_key() {
        let property = |values: &[&str]| {
            Dynamic::object([
                ("key", Dynamic::from("jira.issues")),
                ("name", Dynamic::from("Jira issues")),
                ("value", Dynamic::string_list(values.iter().copied())),
            ])
        };
        let mut value = config("boolean", vec![]);
        if let Dynamic::Map(fields) = &mut value.value {
            fields.insert(
                "custom_properties".to_string(),
                Dynamic::List(vec![property(&["A-1"]), property(&["B-2"])]),
            );
        }
        let err = FeatureFlagResource::validate(&value).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"custom property "jira.issues" is declared more than once"#
        );
    }

    #[test]
    fn implicit_boolean_variations_stay_implicit() {
        let flag = FeatureFlag {
            key: "checkout".to_string(),
            variations: vec![
                Variation {
                    value: json!(true),
                    ..Default::default()
                },
                Variation {
                    value: json!(false),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let prior = config("boolean", vec![]);
        let state = flag_to_state(&flag, "web", Attrs::of(&prior));
        assert_eq!(state.get("variations"), Some(&Dynamic::List(vec![])));

        let imported = DynamicValue::new(Dynamic::object([("id", Dynamic::from("web/checkout"))]));
        let state = flag_to_state(&flag, "web", Attrs::of(&imported));
        assert_eq!(Attrs::new(&state).list("variations").len(), 2);
        assert_eq!(Attrs::new(&state).string("variation_type").as_deref(), Some("boolean"));
    }

    #[test]
    fn unconfigured_defaults_stay_out_of_state() {
        let flag = FeatureFlag {
            key: "checkout".to_string(),
            variations: vec![
                Variation {
                    value: json!("a"),
                    ..Default::default()
                },
                Variation {
                    value: json!("b"),
                    ..Default::default()
                },
            ],
            defaults: Some(Defaults {
                on_variation: 1,
                off_variation: 0,
            }),
            ..Default::default()
        };
        let prior = config("string", vec![variation("a"), variation("b")]);
        let state = flag_to_state(&flag, "web", Attrs::of(&prior));
        assert_eq!(state.get("defaults"), Some(&Dynamic::List(vec![])));

        let imported = DynamicValue::new(Dynamic::object([("id", Dynamic::from("web/checkout"))]));
        let state = flag_to_state(&flag, "web", Attrs::of(&imported));
        let defaults = Attrs::new(&state).block("defaults").unwrap();
        assert_eq!(defaults.int("on_variation"), Some(1));
    }

    #[tokio::test]
    async fn update_without_defaults_leaves_them_alone() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/api/v2/flags/web/checkout")
            .match_request(|request| {
                request
                    .utf8_lossy_body()
                    .map(|body| body.contains("/name") && !body.contains("/defaults"))
                    .unwrap_or(false)
            })
            .with_status(200)
            .with_body(flag_body(json!([{"value": "a"}, {"value": "b"}])))
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/flags/web/checkout")
            .with_status(200)
            .with_body(flag_body(json!([{"value": "a"}, {"value": "b"}])))
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let prior = config("string", vec![variation("a"), variation("b")]);
        let state = FeatureFlagResource.update(&session, &prior, &prior).await.unwrap();
        patch.assert_async().await;
        assert_eq!(state.value.get("defaults"), Some(&Dynamic::List(vec![])));
    }

    #[tokio::test]
    async fn create_posts_then_patches_defaults() {
        let mut server = Server::new_async().await;
        let _project = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"key": "web", "name": "Web"}).to_string())
            .create_async()
            .await;
        let post = server
            .mock("POST", "/api/v2/flags/web")
            .match_body(Matcher::PartialJson(json!({
                "key": "checkout",
                "defaults": {"onVariation": 0, "offVariation": 1}
            })))
            .with_status(201)
            .with_body(flag_body(json!([{"value": "a"}, {"value": "b"}])))
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/api/v2/flags/web/checkout")
            .match_body(Matcher::Regex(r#""path":"/defaults""#.to_string()))
            .with_status(200)
            .with_body(flag_body(json!([{"value": "a"}, {"value": "b"}])))
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/flags/web/checkout")
            .with_status(200)
            .with_body(flag_body(json!([{"value": "a"}, {"value": "b"}])))
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let state = FeatureFlagResource
            .create(&session, &config("string", vec![variation("a"), variation("b")]))
            .await
            .unwrap();
        post.assert_async().await;
        patch.assert_async().await;
        assert_eq!(Attrs::of(&state).string("id").as_deref(), Some("web/checkout"));
        assert_eq!(Attrs::of(&state).list("variations").len(), 2);
    }

    #[tokio::test]
    async fn failed_patch_deletes_new_flag() {
        let mut server = Server::new_async().await;
        let _project = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"key": "web", "name": "Web"}).to_string())
            .create_async()
            .await;
        let _post = server
            .mock("POST", "/api/v2/flags/web")
            .with_status(201)
            .with_body(flag_body(json!([{"value": "a"}, {"value": "b"}])))
            .create_async()
            .await;
        let _patch = server
            .mock("PATCH", "/api/v2/flags/web/checkout")
            .with_status(400)
            .with_body(json!({"code": "invalid_request", "message": "unknown maintainer"}).to_string())
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/v2/flags/web/checkout")
            .with_status(204)
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let err = FeatureFlagResource
            .create(&session, &config("string", vec![variation("a"), variation("b")]))
            .await
            .unwrap_err();
        delete.assert_async().await;
        assert!(err.to_string().contains("unknown maintainer"));
    }

    #[tokio::test]
    async fn update_removes_dropped_variation() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/api/v2/flags/web/checkout")
            .match_body(Matcher::Regex(
                r#"\{"op":"remove","path":"/variations/2"\}"#.to_string(),
            ))
            .with_status(200)
            .with_body(flag_body(json!([{"value": "a"}, {"value": "b"}])))
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/flags/web/checkout")
            .with_status(200)
            .with_body(flag_body(json!([{"value": "a"}, {"value": "b"}])))
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let prior = config("string", vec![variation("a"), variation("b"), variation("c")]);
        let next = config("string", vec![variation("a"), variation("b")]);
        FeatureFlagResource.update(&session, &prior, &next).await.unwrap();
        patch.assert_async().await;
    }
}
