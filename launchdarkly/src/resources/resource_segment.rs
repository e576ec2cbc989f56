use super::attributes::{
    clauses, id, key, optional_bool, optional_string, required_string, string_list, tags,
};
use super::error::{rollback_on_error, ApiContext, ResourceError};
use super::managed::{read_back, require_environment, seeded, Orchestrator};
use crate::api::common::{patch_replace, PatchOperation, PatchWithComment};
use crate::api::segments::{Segment, SegmentPost, SegmentRule, SegmentTarget};
use crate::convert::clause::{clauses_from_config, clauses_to_config};
use crate::convert::ids::SEGMENT_ID;
use crate::convert::rules::MAX_ROLLOUT_WEIGHT;
use crate::convert::{string_list as dynamic_strings, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{AttributeBuilder, AttributeType, Block, BlockBuilder, NestedBlock, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::NumberRangeValidator;

fn context_target_block() -> Block {
    BlockBuilder::new()
        .attribute(required_string("context_kind", "Context kind of the listed keys"))
        .attribute(
            AttributeBuilder::new("values", AttributeType::list_of(AttributeType::String))
                .description("Context keys")
                .required()
                .build(),
        )
        .build()
}

fn rule_block() -> Block {
    BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("weight", AttributeType::Number)
                .description("Percentage of matching contexts included, in thousandths of a percent")
                .optional()
                .validator(NumberRangeValidator::new(Some(0.0), Some(MAX_ROLLOUT_WEIGHT as f64)))
                .build(),
        )
        .attribute(optional_string("bucket_by", "Attribute used to bucket contexts"))
        .attribute(optional_string(
            "rollout_context_kind",
            "Context kind used for the weighted rollout",
        ))
        .block(clauses())
        .build()
}

pub fn segment_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages a segment in one environment")
        .attribute(id())
        .attribute(key("project_key", "Key of the project"))
        .attribute(key("env_key", "Key of the environment"))
        .attribute(key("key", "Environment-unique key of the segment"))
        .attribute(required_string("name", "Display name"))
        .attribute(optional_string("description", "Description"))
        .attribute(tags())
        .attribute(optional_bool("temporary", "Whether the segment is expected to be removed"))
        .attribute(string_list("included", "User keys always included"))
        .attribute(string_list("excluded", "User keys always excluded"))
        .attribute(
            AttributeBuilder::new("creation_date", AttributeType::Number)
                .description("Creation time in Unix milliseconds")
                .computed()
                .build(),
        )
        .block(NestedBlock::list("included_contexts", context_target_block()))
        .block(NestedBlock::list("excluded_contexts", context_target_block()))
        .block(NestedBlock::list("rules", rule_block()))
        .build()
}

fn segment_keys(attrs: Attrs<'_>) -> Result<(String, String, String), ConvertError> {
    match (
        attrs.non_empty("project_key"),
        attrs.non_empty("env_key"),
        attrs.non_empty("key"),
    ) {
        (Some(project_key), Some(env_key), Some(key)) => Ok((project_key, env_key, key)),
        _ => {
            let id = attrs.str_or_empty("id");
            let parts = SEGMENT_ID.parse(&id)?;
            Ok((parts[0].to_string(), parts[1].to_string(), parts[2].to_string()))
        }
    }
}

fn context_targets_from_config(list: &[Dynamic]) -> Vec<SegmentTarget> {
    list.iter()
        .map(|item| {
            let attrs = Attrs::new(item);
            SegmentTarget {
                values: attrs.strings("values"),
                context_kind: attrs.str_or_empty("context_kind"),
            }
        })
        .collect()
}

fn context_targets_to_config(targets: &[SegmentTarget]) -> Dynamic {
    Dynamic::List(
        targets
            .iter()
            .map(|t| {
                Dynamic::object([
                    ("context_kind", Dynamic::from(t.context_kind.as_str())),
                    ("values", dynamic_strings(&t.values)),
                ])
            })
            .collect(),
    )
}

fn segment_rules_from_config(list: &[Dynamic]) -> Result<Vec<SegmentRule>, ConvertError> {
    list.iter()
        .map(|item| {
            let attrs = Attrs::new(item);
            let weight = attrs.int("weight");
            let bucket_by = attrs.non_empty("bucket_by");
            if bucket_by.is_some() && weight.is_none() {
                return Err(ConvertError::validation(
                    "rules: cannot use bucket_by argument without weight",
                ));
            }
            Ok(SegmentRule {
                id: None,
                clauses: clauses_from_config(attrs.list("clauses"))?,
                weight,
                bucket_by,
                rollout_context_kind: attrs.non_empty("rollout_context_kind"),
            })
        })
        .collect()
}

fn segment_rules_to_config(rules: &[SegmentRule]) -> Dynamic {
    Dynamic::List(
        rules
            .iter()
            .map(|rule| {
                Dynamic::object([
                    ("clauses", clauses_to_config(&rule.clauses)),
                    ("weight", Dynamic::from(rule.weight)),
                    ("bucket_by", Dynamic::from(rule.bucket_by.clone())),
                    (
                        "rollout_context_kind",
                        Dynamic::from(rule.rollout_context_kind.clone()),
                    ),
                ])
            })
            .collect(),
    )
}

/// Targeting fields, sent as a follow-up to creation and on every update.
fn targeting_patches(attrs: Attrs<'_>) -> Result<Vec<PatchOperation>, ConvertError> {
    Ok(vec![
        patch_replace("/temporary", attrs.bool_or("temporary", false)),
        patch_replace("/included", attrs.strings("included")),
        patch_replace("/excluded", attrs.strings("excluded")),
        patch_replace(
            "/includedContexts",
            context_targets_from_config(attrs.list("included_contexts")),
        ),
        patch_replace(
            "/excludedContexts",
            context_targets_from_config(attrs.list("excluded_contexts")),
        ),
        patch_replace("/rules", segment_rules_from_config(attrs.list("rules"))?),
    ])
}

pub fn segment_to_state(project_key: &str, env_key: &str, segment: &Segment) -> Dynamic {
    Dynamic::object([
        (
            "id",
            Dynamic::from(SEGMENT_ID.join(&[project_key, env_key, segment.key.as_str()])),
        ),
        ("project_key", Dynamic::from(project_key)),
        ("env_key", Dynamic::from(env_key)),
        ("key", Dynamic::from(segment.key.as_str())),
        ("name", Dynamic::from(segment.name.as_str())),
        ("description", Dynamic::from(segment.description.as_str())),
        ("tags", dynamic_strings(&segment.tags)),
        ("temporary", Dynamic::from(segment.temporary)),
        ("included", dynamic_strings(&segment.included)),
        ("excluded", dynamic_strings(&segment.excluded)),
        (
            "included_contexts",
            context_targets_to_config(&segment.included_contexts),
        ),
        (
            "excluded_contexts",
            context_targets_to_config(&segment.excluded_contexts),
        ),
        ("rules", segment_rules_to_config(&segment.rules)),
        ("creation_date", Dynamic::from(segment.creation_date)),
    ])
}

#[derive(Default)]
pub struct SegmentResource;

#[async_trait]
impl Orchestrator for SegmentResource {
    const TYPE_NAME: &'static str = "launchdarkly_segment";
    const NOUN: &'static str = "segment";

    fn schema() -> Schema {
        segment_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        segment_rules_from_config(Attrs::of(config).list("rules")).map(drop)
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = SEGMENT_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("project_key"), parts[0].to_string()),
            (AttributePath::new("env_key"), parts[1].to_string()),
            (AttributePath::new("key"), parts[2].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let (project_key, env_key, key) = segment_keys(attrs)?;
        let id = SEGMENT_ID.join(&[&project_key, &env_key, &key]);
        let patches = targeting_patches(attrs)?;
        require_environment(client, &project_key, &env_key).await?;

        let post = SegmentPost {
            key: key.clone(),
            name: attrs.str_or_empty("name"),
            description: attrs.str_or_empty("description"),
            tags: attrs.strings("tags"),
        };
        client
            .segments()
            .create(&project_key, &env_key, &post)
            .await
            .during("create", Self::NOUN, &id)?;

        let targeting = client
            .segments()
            .patch(&project_key, &env_key, &key, &PatchWithComment::terraform(patches))
            .await
            .during("update", Self::NOUN, &id)
            .map(drop);
        rollback_on_error(
            targeting,
            Self::NOUN,
            &id,
            client.segments().delete(&project_key, &env_key, &key),
        )
        .await?;

        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let (project_key, env_key, key) = segment_keys(Attrs::of(state))?;
        let id = SEGMENT_ID.join(&[&project_key, &env_key, &key]);
        Ok(session
            .client
            .segments()
            .get(&project_key, &env_key, &key)
            .await
            .absent_during("read", Self::NOUN, &id)?
            .map(|segment| DynamicValue::new(segment_to_state(&project_key, &env_key, &segment))))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        let (project_key, env_key, key) = segment_keys(Attrs::of(prior))?;
        let id = SEGMENT_ID.join(&[&project_key, &env_key, &key]);

        let mut patches = vec![
            patch_replace("/name", attrs.str_or_empty("name")),
            patch_replace("/description", attrs.str_or_empty("description")),
            patch_replace("/tags", attrs.strings("tags")),
        ];
        patches.extend(targeting_patches(attrs)?);
        session
            .client
            .segments()
            .patch(&project_key, &env_key, &key, &PatchWithComment::terraform(patches))
            .await
            .during("update", Self::NOUN, &id)?;

        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let (project_key, env_key, key) = segment_keys(Attrs::of(prior))?;
        session
            .client
            .segments()
            .delete(&project_key, &env_key, &key)
            .await
            .during("delete", Self::NOUN, &SEGMENT_ID.join(&[&project_key, &env_key, &key]))
    }
}
