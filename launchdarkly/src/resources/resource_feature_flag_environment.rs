use super::attributes::{clauses, id, key, optional_bool, optional_string};
use super::error::{ApiContext, ResourceError};
use super::managed::{read_back, require_environment, seeded, Orchestrator};
use crate::api::common::{patch_replace, PatchOperation, PatchWithComment};
use crate::api::flags::{FeatureFlag, Fallthrough, FlagEnvironment};
use crate::convert::ids::{FLAG_ENVIRONMENT_ID, FLAG_ID};
use crate::convert::rules::{
    fallthrough_from_config, fallthrough_to_config, prerequisites_from_config,
    prerequisites_to_config, rules_from_config, rules_to_config, MAX_ROLLOUT_WEIGHT,
};
use crate::convert::targets::{
    context_targets_from_config, context_targets_to_config, targets_from_config,
    targets_to_config,
};
use crate::convert::{Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{
    Attribute, AttributeBuilder, AttributeType, BlockBuilder, NestedBlock, Schema, SchemaBuilder,
};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::{EachElement, NumberRangeValidator, StringPatternValidator};

fn variation_index(required: bool) -> Attribute {
    let builder = AttributeBuilder::new("variation", AttributeType::Number)
        .description("Index of the variation to serve")
        .validator(NumberRangeValidator::new(Some(0.0), None));
    let builder = if required {
        builder.required()
    } else {
        builder.optional()
    };
    builder.build()
}

fn rollout_weights() -> Attribute {
    AttributeBuilder::new("rollout_weights", AttributeType::list_of(AttributeType::Number))
        .description("Per-variation weights in thousandths of a percent, summing to 100000")
        .optional()
        .validator(EachElement::new(NumberRangeValidator::new(
            Some(0.0),
            Some(MAX_ROLLOUT_WEIGHT as f64),
        )))
        .build()
}

fn target_values() -> Attribute {
    AttributeBuilder::new("values", AttributeType::list_of(AttributeType::String))
        .description("Context keys to target")
        .required()
        .build()
}

pub fn feature_flag_environment_schema() -> Schema {
    let rules = BlockBuilder::new()
        .attribute(variation_index(false))
        .attribute(rollout_weights())
        .attribute(optional_string("bucket_by", "Attribute used to bucket contexts in a rollout"))
        .attribute(optional_string("description", "Description of the rule"))
        .block(clauses())
        .build();
    let fallthrough = BlockBuilder::new()
        .attribute(variation_index(false))
        .attribute(rollout_weights())
        .attribute(optional_string("bucket_by", "Attribute used to bucket contexts in a rollout"))
        .build();
    let prerequisites = BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("flag_key", AttributeType::String)
                .description("Key of the prerequisite flag")
                .required()
                .build(),
        )
        .attribute(variation_index(true))
        .build();
    let targets = BlockBuilder::new()
        .attribute(target_values())
        .attribute(variation_index(true))
        .build();
    let context_targets = BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("context_kind", AttributeType::String)
                .description("Context kind of the targeted keys")
                .required()
                .build(),
        )
        .attribute(target_values())
        .attribute(variation_index(true))
        .build();

    SchemaBuilder::new()
        .description("Manages the targeting of a feature flag in one environment")
        .attribute(id())
        .attribute(
            AttributeBuilder::new("flag_id", AttributeType::String)
                .description("ID of the flag, `project_key/flag_key`")
                .required()
                .force_new()
                .validator(StringPatternValidator::new(
                    r"^[^/]+/[^/]+$",
                    "must be of the form project_key/flag_key",
                ))
                .build(),
        )
        .attribute(key("env_key", "Key of the environment"))
        .attribute(optional_bool("on", "Whether targeting is on"))
        .attribute(
            AttributeBuilder::new("off_variation", AttributeType::Number)
                .description("Index of the variation served when targeting is off")
                .optional()
                .computed()
                .validator(NumberRangeValidator::new(Some(0.0), None))
                .build(),
        )
        .attribute(optional_bool("track_events", "Send detailed event data for this flag"))
        .block(NestedBlock::list("rules", rules))
        .block(NestedBlock::list("prerequisites", prerequisites))
        .block(NestedBlock::list("targets", targets))
        .block(NestedBlock::list("context_targets", context_targets))
        .block(NestedBlock::list("fallthrough", fallthrough).max_items(1))
        .build()
}

/// `(project_key, env_key, flag_key)`
fn targeting_keys(attrs: Attrs<'_>) -> Result<(String, String, String), ConvertError> {
    if let (Some(flag_id), Some(env_key)) = (attrs.non_empty("flag_id"), attrs.non_empty("env_key")) {
        let parts = FLAG_ID.parse(&flag_id)?;
        return Ok((parts[0].to_string(), env_key, parts[1].to_string()));
    }
    let id = attrs.str_or_empty("id");
    let parts = FLAG_ENVIRONMENT_ID.parse(&id)?;
    Ok((parts[0].to_string(), parts[1].to_string(), parts[2].to_string()))
}

fn check_off_variation(attrs: Attrs<'_>, flag: &FeatureFlag) -> Result<Option<usize>, ConvertError> {
    let Some(off) = attrs.index("off_variation")? else {
        return Ok(None);
    };
    let max = flag.variations.len().saturating_sub(1);
    if off > max {
        return Err(ConvertError::OutOfRange {
            field: "off_variation".to_string(),
            value: off as i64,
            max: max as i64,
        });
    }
    Ok(Some(off))
}

fn targeting_patches(
    attrs: Attrs<'_>,
    env_key: &str,
    off_variation: Option<usize>,
) -> Result<Vec<PatchOperation>, ConvertError> {
    let path = |field: &str| format!("/environments/{}/{}", env_key, field);
    let mut patches = vec![
        patch_replace(path("on"), attrs.bool_or("on", false)),
        patch_replace(path("rules"), rules_from_config(attrs.list("rules"))?),
        patch_replace(
            path("prerequisites"),
            prerequisites_from_config(attrs.list("prerequisites"))?,
        ),
        patch_replace(path("targets"), targets_from_config(attrs.list("targets"))?),
        patch_replace(
            path("contextTargets"),
            context_targets_from_config(attrs.list("context_targets"))?,
        ),
        patch_replace(path("trackEvents"), attrs.bool_or("track_events", false)),
    ];
    // Without a fallthrough block the server keeps whatever it has.
    if let Some(fallthrough) = attrs.block("fallthrough") {
        patches.push(patch_replace(
            path("fallthrough"),
            fallthrough_from_config(Some(fallthrough))?,
        ));
    }
    if let Some(off) = off_variation {
        patches.push(patch_replace(path("offVariation"), off));
    }
    Ok(patches)
}

/// Targeting of a fresh environment: off, no rules, serving the first
/// variation and falling back to the last.
fn reset_patches(env_key: &str, variation_count: usize) -> Vec<PatchOperation> {
    let path = |field: &str| format!("/environments/{}/{}", env_key, field);
    let empty: Vec<serde_json::Value> = vec![];
    vec![
        patch_replace(path("on"), false),
        patch_replace(path("rules"), &empty),
        patch_replace(path("prerequisites"), &empty),
        patch_replace(path("targets"), &empty),
        patch_replace(path("contextTargets"), &empty),
        patch_replace(path("trackEvents"), false),
        patch_replace(path("offVariation"), variation_count.saturating_sub(1)),
        patch_replace(
            path("fallthrough"),
            Fallthrough {
                variation: Some(0),
                rollout: None,
            },
        ),
    ]
}

/// The fallthrough is reported when `prior` declared one, or when `prior`
/// is an import seed that has no entry for it at all.
fn targeting_to_state(
    project_key: &str,
    env_key: &str,
    flag_key: &str,
    env: &FlagEnvironment,
    prior: Attrs<'_>,
) -> Dynamic {
    let fallthrough = match &env.fallthrough {
        Some(f) if !prior.has("fallthrough") || prior.block("fallthrough").is_some() => {
            fallthrough_to_config(f)
        }
        _ => Dynamic::List(vec![]),
    };
    Dynamic::object([
        (
            "id",
            Dynamic::from(FLAG_ENVIRONMENT_ID.join(&[project_key, env_key, flag_key])),
        ),
        ("flag_id", Dynamic::from(FLAG_ID.join(&[project_key, flag_key]))),
        ("env_key", Dynamic::from(env_key)),
        ("on", Dynamic::from(env.on)),
        ("off_variation", Dynamic::from(env.off_variation.map(|v| v as i64))),
        ("track_events", Dynamic::from(env.track_events)),
        ("rules", rules_to_config(&env.rules)),
        ("prerequisites", prerequisites_to_config(&env.prerequisites)),
        ("targets", targets_to_config(&env.targets)),
        ("context_targets", context_targets_to_config(&env.context_targets)),
        ("fallthrough", fallthrough),
    ])
}

#[derive(Default)]
pub struct FeatureFlagEnvironmentResource;

impl FeatureFlagEnvironmentResource {
    async fn apply(&self, session: &Session, config: &DynamicValue, operation: &'static str) -> Result<String, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let (project_key, env_key, flag_key) = targeting_keys(attrs)?;
        let id = FLAG_ENVIRONMENT_ID.join(&[&project_key, &env_key, &flag_key]);

        let flag = client
            .flags()
            .get(&project_key, &flag_key)
            .await
            .during("read", "feature flag", &FLAG_ID.join(&[&project_key, &flag_key]))?;
        let off_variation = check_off_variation(attrs, &flag)?;
        let patches = targeting_patches(attrs, &env_key, off_variation)?;
        client
            .flags()
            .patch(&project_key, &flag_key, &PatchWithComment::terraform(patches))
            .await
            .during(operation, Self::NOUN, &id)?;
        Ok(id)
    }
}

#[async_trait]
impl Orchestrator for FeatureFlagEnvironmentResource {
    const TYPE_NAME: &'static str = "launchdarkly_feature_flag_environment";
    const NOUN: &'static str = "flag targeting";

    fn schema() -> Schema {
        feature_flag_environment_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        let attrs = Attrs::of(config);
        rules_from_config(attrs.list("rules"))?;
        fallthrough_from_config(attrs.block("fallthrough"))?;
        context_targets_from_config(attrs.list("context_targets"))?;
        Ok(())
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = FLAG_ENVIRONMENT_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("flag_id"), FLAG_ID.join(&[parts[0], parts[2]])),
            (AttributePath::new("env_key"), parts[1].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let (project_key, env_key, _) = targeting_keys(Attrs::of(config))?;
        require_environment(&session.client, &project_key, &env_key).await?;
        let id = self.apply(session, config, "create").await?;
        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let attrs = Attrs::of(state);
        let (project_key, env_key, flag_key) = targeting_keys(attrs)?;
        let id = FLAG_ENVIRONMENT_ID.join(&[&project_key, &env_key, &flag_key]);
        let flag = session
            .client
            .flags()
            .get_in_environment(&project_key, &flag_key, &env_key)
            .await
            .absent_during("read", Self::NOUN, &id)?;
        Ok(flag.and_then(|flag| {
            flag.environments
                .get(&env_key)
                .map(|env| DynamicValue::new(targeting_to_state(&project_key, &env_key, &flag_key, env, attrs)))
        }))
    }

    async fn update(
        &self,
        session: &Session,
        _prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let id = self.apply(session, config, "update").await?;
        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    /// The targeting cannot be removed, only reset.
    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let client = &session.client;
        let (project_key, env_key, flag_key) = targeting_keys(Attrs::of(prior))?;
        let id = FLAG_ENVIRONMENT_ID.join(&[&project_key, &env_key, &flag_key]);
        let Some(flag) = client
            .flags()
            .get(&project_key, &flag_key)
            .await
            .absent_during("read", "feature flag", &id)?
        else {
            return Ok(());
        };
        client
            .flags()
            .patch(
                &project_key,
                &flag_key,
                &PatchWithComment::terraform(reset_patches(&env_key, flag.variations.len())),
            )
            .await
            .during("delete", Self::NOUN, &id)
            .map(drop)
    }
}
