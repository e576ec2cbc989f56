use super::attributes::{id, key, maintainer_id, optional_bool, optional_string, required_string, tags};
use super::error::{rollback_on_error, ApiContext, ResourceError};
use super::managed::{read_back, require_project, seeded, Orchestrator};
use crate::api::common::{patch_replace, PatchOperation};
use crate::api::metrics::{Metric, MetricPost, UrlMatcher};
use crate::convert::ids::METRIC_ID;
use crate::convert::{string_list, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{AttributeBuilder, AttributeType, Block, BlockBuilder, NestedBlock, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

pub const METRIC_KINDS: [&str; 3] = ["pageview", "click", "custom"];
pub const URL_KINDS: [&str; 4] = ["exact", "canonical", "substring", "regex"];
pub const SUCCESS_CRITERIA: [&str; 2] = ["HigherThanBaseline", "LowerThanBaseline"];

fn url_block() -> Block {
    BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("kind", AttributeType::String)
                .description("How the page URL is matched")
                .required()
                .validator(StringOneOfValidator::new(URL_KINDS))
                .build(),
        )
        .attribute(optional_string("url", "URL for exact and canonical matchers"))
        .attribute(optional_string("substring", "Substring for substring matchers"))
        .attribute(optional_string("pattern", "Regular expression for regex matchers"))
        .build()
}

pub fn metric_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages a metric in a project")
        .attribute(id())
        .attribute(key("project_key", "Key of the project"))
        .attribute(key("key", "Project-unique key of the metric"))
        .attribute(required_string("name", "Display name"))
        .attribute(
            AttributeBuilder::new("kind", AttributeType::String)
                .description("One of pageview, click or custom")
                .required()
                .force_new()
                .validator(StringOneOfValidator::new(METRIC_KINDS))
                .build(),
        )
        .attribute(optional_string("description", "Description"))
        .attribute(tags())
        .attribute(optional_bool("is_active", "Whether the metric is collecting data"))
        .attribute(optional_bool("is_numeric", "Whether a custom metric tracks a value"))
        .attribute(optional_string("unit", "Unit of a numeric custom metric"))
        .attribute(optional_string("selector", "CSS selector of a click metric"))
        .attribute(optional_string("event_key", "Event key of a custom metric"))
        .attribute(
            AttributeBuilder::new("success_criteria", AttributeType::String)
                .description("Which direction counts as an improvement")
                .optional()
                .validator(StringOneOfValidator::new(SUCCESS_CRITERIA))
                .build(),
        )
        .attribute(maintainer_id())
        .block(NestedBlock::list("urls", url_block()))
        .build()
}

fn urls_from_config(attrs: Attrs<'_>) -> Vec<UrlMatcher> {
    attrs
        .blocks("urls")
        .into_iter()
        .map(|url| UrlMatcher {
            kind: url.str_or_empty("kind"),
            url: url.non_empty("url"),
            substring: url.non_empty("substring"),
            pattern: url.non_empty("pattern"),
        })
        .collect()
}

fn urls_to_config(urls: &[UrlMatcher]) -> Dynamic {
    Dynamic::List(
        urls.iter()
            .map(|u| {
                Dynamic::object([
                    ("kind", Dynamic::from(u.kind.as_str())),
                    ("url", Dynamic::from(u.url.clone())),
                    ("substring", Dynamic::from(u.substring.clone())),
                    ("pattern", Dynamic::from(u.pattern.clone())),
                ])
            })
            .collect(),
    )
}

fn url_is_complete(url: &UrlMatcher) -> bool {
    match url.kind.as_str() {
        "exact" | "canonical" => url.url.is_some(),
        "substring" => url.substring.is_some(),
        "regex" => url.pattern.is_some(),
        _ => false,
    }
}

/// Which fields each kind requires and rejects.
pub fn check_metric_fields(attrs: Attrs<'_>) -> Result<(), ConvertError> {
    let kind = attrs.str_or_empty("kind");
    let urls = urls_from_config(attrs);
    let has = |name: &str| attrs.non_empty(name).is_some();
    let fail = |msg: String| Err(ConvertError::validation(msg));
    let urls_ok = urls.iter().all(url_is_complete);

    match kind.as_str() {
        "click" => {
            if !has("selector") {
                return fail("click metrics require 'selector' to be set".into());
            }
            if urls.is_empty() {
                return fail("click metrics require an 'urls' block to be set".into());
            }
            if !urls_ok {
                return fail("'urls' block is misconfigured, please check documentation for required fields".into());
            }
            for field in ["success_criteria", "unit", "event_key"] {
                if has(field) {
                    return fail(format!("click metrics do not accept '{}'", field));
                }
            }
        }
        "custom" => {
            if attrs.bool_or("is_numeric", false) {
                for field in ["success_criteria", "unit"] {
                    if !has(field) {
                        return fail(format!("numeric custom metrics require '{}' to be set", field));
                    }
                }
            }
            if !has("event_key") {
                return fail("custom meterics require 'event_key' to be set".into());
            }
            if !urls.is_empty() {
                return fail("custom metrics do not accept a 'urls' block".into());
            }
            if has("selector") {
                return fail("custom metrics do not accept 'selector'".into());
            }
        }
        "pageview" => {
            if urls.is_empty() {
                return fail("pageview metrics require an 'urls' block to be set".into());
            }
            if !urls_ok {
                return fail("'urls' block is misconfigured, please check documentation for required fields".into());
            }
            for field in ["success_criteria", "unit", "event_key", "selector"] {
                if has(field) {
                    return fail(format!("pageview metrics do not accept '{}'", field));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn metric_post(key: String, attrs: Attrs<'_>) -> MetricPost {
    MetricPost {
        key,
        name: attrs.str_or_empty("name"),
        kind: attrs.str_or_empty("kind"),
        description: attrs.str_or_empty("description"),
        tags: attrs.strings("tags"),
        is_active: attrs.bool_or("is_active", true),
        is_numeric: attrs.bool_or("is_numeric", false),
        unit: attrs.non_empty("unit"),
        selector: attrs.non_empty("selector"),
        event_key: attrs.non_empty("event_key"),
        success_criteria: attrs.non_empty("success_criteria"),
        urls: urls_from_config(attrs),
    }
}

fn metric_patches(attrs: Attrs<'_>) -> Vec<PatchOperation> {
    let mut patches = vec![
        patch_replace("/name", attrs.str_or_empty("name")),
        patch_replace("/description", attrs.str_or_empty("description")),
        patch_replace("/tags", attrs.strings("tags")),
        patch_replace("/kind", attrs.str_or_empty("kind")),
        patch_replace("/isActive", attrs.bool_or("is_active", true)),
        patch_replace("/isNumeric", attrs.bool_or("is_numeric", false)),
        patch_replace("/urls", urls_from_config(attrs)),
        patch_replace("/unit", attrs.non_empty("unit")),
        patch_replace("/selector", attrs.non_empty("selector")),
        patch_replace("/eventKey", attrs.non_empty("event_key")),
    ];
    if let Some(criteria) = attrs.non_empty("success_criteria") {
        patches.push(patch_replace("/successCriteria", criteria));
    }
    if let Some(maintainer) = attrs.non_empty("maintainer_id") {
        patches.push(patch_replace("/maintainerId", maintainer));
    }
    patches
}

pub fn metric_to_state(project_key: &str, metric: &Metric) -> Dynamic {
    Dynamic::object([
        ("id", Dynamic::from(METRIC_ID.join(&[project_key, metric.key.as_str()]))),
        ("project_key", Dynamic::from(project_key)),
        ("key", Dynamic::from(metric.key.as_str())),
        ("name", Dynamic::from(metric.name.as_str())),
        ("kind", Dynamic::from(metric.kind.as_str())),
        ("description", Dynamic::from(metric.description.as_str())),
        ("tags", string_list(&metric.tags)),
        ("is_active", Dynamic::from(metric.is_active)),
        ("is_numeric", Dynamic::from(metric.is_numeric)),
        ("unit", Dynamic::from(metric.unit.clone())),
        ("selector", Dynamic::from(metric.selector.clone())),
        ("event_key", Dynamic::from(metric.event_key.clone())),
        ("success_criteria", Dynamic::from(metric.success_criteria.clone())),
        ("urls", urls_to_config(&metric.urls)),
        ("maintainer_id", Dynamic::from(metric.maintainer_id.clone())),
    ])
}

fn metric_keys(attrs: Attrs<'_>) -> Result<(String, String), ConvertError> {
    match (attrs.non_empty("project_key"), attrs.non_empty("key")) {
        (Some(project_key), Some(key)) => Ok((project_key, key)),
        _ => {
            let id = attrs.str_or_empty("id");
            let parts = METRIC_ID.parse(&id)?;
            Ok((parts[0].to_string(), parts[1].to_string()))
        }
    }
}

#[derive(Default)]
pub struct MetricResource;

#[async_trait]
impl Orchestrator for MetricResource {
    const TYPE_NAME: &'static str = "launchdarkly_metric";
    const NOUN: &'static str = "metric";

    fn schema() -> Schema {
        metric_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        check_metric_fields(Attrs::of(config))
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = METRIC_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("project_key"), parts[0].to_string()),
            (AttributePath::new("key"), parts[1].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        check_metric_fields(attrs)?;
        let (project_key, key) = metric_keys(attrs)?;
        let id = METRIC_ID.join(&[&project_key, &key]);
        require_project(client, &project_key).await?;

        client
            .metrics()
            .create(&project_key, &metric_post(key.clone(), attrs))
            .await
            .during("create", Self::NOUN, &id)?;

        // The create endpoint does not take a maintainer.
        if let Some(maintainer) = attrs.non_empty("maintainer_id") {
            let assigned = client
                .metrics()
                .patch(&project_key, &key, &[patch_replace("/maintainerId", maintainer)])
                .await
                .during("update", Self::NOUN, &id)
                .map(drop);
            rollback_on_error(assigned, Self::NOUN, &id, client.metrics().delete(&project_key, &key)).await?;
        }

        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let (project_key, key) = metric_keys(Attrs::of(state))?;
        let id = METRIC_ID.join(&[&project_key, &key]);
        Ok(session
            .client
            .metrics()
            .get(&project_key, &key)
            .await
            .absent_during("read", Self::NOUN, &id)?
            .map(|metric| DynamicValue::new(metric_to_state(&project_key, &metric))))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let attrs = Attrs::of(config);
        check_metric_fields(attrs)?;
        let (project_key, key) = metric_keys(Attrs::of(prior))?;
        let id = METRIC_ID.join(&[&project_key, &key]);
        session
            .client
            .metrics()
            .patch(&project_key, &key, &metric_patches(attrs))
            .await
            .during("update", Self::NOUN, &id)?;
        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let (project_key, key) = metric_keys(Attrs::of(prior))?;
        session
            .client
            .metrics()
            .delete(&project_key, &key)
            .await
            .during("delete", Self::NOUN, &METRIC_ID.join(&[&project_key, &key]))
    }
}
