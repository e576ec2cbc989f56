use super::attributes::{self, computed_secret, id, key, optional_bool, required_string, tags};
use super::error::{rollback_on_error, ApiContext, ResourceError};
use super::managed::{extend_object, read_back, require_project, seeded, Orchestrator};
use crate::api::Client;
use crate::convert::approvals::{approval_settings_from_config, MAX_APPROVALS, MIN_APPROVALS};
use crate::convert::environments::{
    environment_patches, environment_post, environment_to_config, MAX_DEFAULT_TTL,
};
use crate::convert::ids::ENVIRONMENT_ID;
use crate::convert::{Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use tfplug::schema::{
    Attribute, AttributeBuilder, AttributeType, Block, BlockBuilder, NestedBlock, Schema,
    SchemaBuilder,
};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::NumberRangeValidator;

fn default_ttl() -> Attribute {
    AttributeBuilder::new("default_ttl", AttributeType::Number)
        .description("TTL in minutes for client-side SDK caching of flag values")
        .optional()
        .computed()
        .validator(NumberRangeValidator::new(Some(0.0), Some(MAX_DEFAULT_TTL as f64)))
        .build()
}

/// Everything an environment carries apart from its own key and parent.
fn environment_settings() -> Vec<Attribute> {
    vec![
        required_string("name", "Display name"),
        required_string("color", "Hex color shown in the UI"),
        default_ttl(),
        optional_bool("secure_mode", "Require a secure hash for client-side SDKs"),
        optional_bool(
            "default_track_events",
            "Send detailed event data for new flags by default",
        ),
        optional_bool("require_comments", "Require comments on flag changes"),
        optional_bool("confirm_changes", "Require confirmation of flag changes"),
        tags(),
        computed_secret("api_key", "Server-side SDK key"),
        computed_secret("mobile_key", "Mobile SDK key"),
        computed_secret("client_side_id", "Client-side ID"),
    ]
}

fn approval_settings_block() -> NestedBlock {
    let block = BlockBuilder::new()
        .attribute(optional_bool(
            "required",
            "Every flag change needs approval. Exclusive with required_approval_tags",
        ))
        .attribute(optional_bool(
            "can_review_own_request",
            "Requesters may approve their own requests",
        ))
        .attribute(
            AttributeBuilder::new("min_num_approvals", AttributeType::Number)
                .description("Approvals needed before a request can be applied")
                .optional()
                .computed()
                .validator(NumberRangeValidator::new(
                    Some(MIN_APPROVALS as f64),
                    Some(MAX_APPROVALS as f64),
                ))
                .build(),
        )
        .attribute(optional_bool(
            "can_apply_declined_changes",
            "Requests with enough approvals apply even when declined by a reviewer",
        ))
        .attribute(
            AttributeBuilder::new(
                "required_approval_tags",
                AttributeType::list_of(AttributeType::String),
            )
            .description("Only flags carrying one of these tags need approval")
            .optional()
            .computed()
            .build(),
        )
        .build();
    NestedBlock::list("approval_settings", block).max_items(1)
}

fn check_approval_settings(attrs: Attrs<'_>) -> Result<(), ConvertError> {
    match attrs.block("approval_settings") {
        Some(block) => approval_settings_from_config(block).map(drop),
        None => Ok(()),
    }
}

/// Approval settings of every environment a project declares.
pub fn check_project_approvals(attrs: Attrs<'_>) -> Result<(), ConvertError> {
    attrs
        .blocks("environments")
        .into_iter()
        .try_for_each(check_approval_settings)
}

/// Environment entry nested in a project.
pub fn environment_block() -> Block {
    environment_settings()
        .into_iter()
        .fold(BlockBuilder::new(), BlockBuilder::attribute)
        .block(approval_settings_block())
        .attribute(
            AttributeBuilder::new("key", AttributeType::String)
                .description("Project-unique key of the environment")
                .required()
                .validator(attributes::key_validator())
                .build(),
        )
        .build()
}

pub fn environment_schema() -> Schema {
    let builder = SchemaBuilder::new()
        .description("Manages an environment within a project")
        .attribute(id())
        .attribute(key("project_key", "Key of the project the environment belongs to"))
        .attribute(key("key", "Project-unique key of the environment"));
    environment_settings()
        .into_iter()
        .fold(builder, SchemaBuilder::attribute)
        .block(approval_settings_block())
        .build()
}

/// State for one environment; `Ok(None)` when it is gone. `prior` is
/// `None` for imports and lookups.
pub async fn read_environment(
    client: &Client,
    project_key: &str,
    env_key: &str,
    prior: Option<Attrs<'_>>,
) -> Result<Option<Dynamic>, ResourceError> {
    let id = ENVIRONMENT_ID.join(&[project_key, env_key]);
    let Some(env) = client
        .environments()
        .get(project_key, env_key)
        .await
        .absent_during("read", "environment", &id)?
    else {
        return Ok(None);
    };
    Ok(Some(extend_object(
        environment_to_config(&env, prior),
        [
            ("id", Dynamic::from(id)),
            ("project_key", Dynamic::from(project_key)),
        ],
    )))
}

#[derive(Default)]
pub struct EnvironmentResource;

impl EnvironmentResource {
    fn keys(state: &DynamicValue) -> Result<(String, String), ConvertError> {
        let attrs = Attrs::of(state);
        match (attrs.non_empty("project_key"), attrs.non_empty("key")) {
            (Some(project_key), Some(key)) => Ok((project_key, key)),
            _ => {
                let id = attrs.str_or_empty("id");
                let parts = ENVIRONMENT_ID.parse(&id)?;
                Ok((parts[0].to_string(), parts[1].to_string()))
            }
        }
    }
}

#[async_trait]
impl Orchestrator for EnvironmentResource {
    const TYPE_NAME: &'static str = "launchdarkly_environment";
    const NOUN: &'static str = "environment";

    fn schema() -> Schema {
        environment_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        check_approval_settings(Attrs::of(config))
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        let parts = ENVIRONMENT_ID.parse(id)?;
        Ok(vec![
            (AttributePath::new("project_key"), parts[0].to_string()),
            (AttributePath::new("key"), parts[1].to_string()),
        ])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let (project_key, key) = Self::keys(config)?;
        let id = ENVIRONMENT_ID.join(&[&project_key, &key]);
        require_project(client, &project_key).await?;

        let post = environment_post(attrs)?;
        client
            .environments()
            .create(&project_key, &post)
            .await
            .during("create", Self::NOUN, &id)?;

        let settings = async {
            let patches = environment_patches(attrs, None)?;
            client
                .environments()
                .patch(&project_key, &key, &patches)
                .await
                .during("update", Self::NOUN, &id)?;
            Ok::<(), ResourceError>(())
        };
        rollback_on_error(
            settings.await,
            Self::NOUN,
            &id,
            client.environments().delete(&project_key, &key),
        )
        .await?;

        read_back(self, session, &seeded(config, &id), "create", &id).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let (project_key, key) = Self::keys(state)?;
        let prior = Some(Attrs::of(state)).filter(|attrs| attrs.is_set("name"));
        Ok(read_environment(&session.client, &project_key, &key, prior)
            .await?
            .map(DynamicValue::new))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let (project_key, key) = Self::keys(prior)?;
        let id = ENVIRONMENT_ID.join(&[&project_key, &key]);
        let patches = environment_patches(Attrs::of(config), Some(Attrs::of(prior)))?;
        session
            .client
            .environments()
            .patch(&project_key, &key, &patches)
            .await
            .during("update", Self::NOUN, &id)?;
        read_back(self, session, &seeded(config, &id), "update", &id).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let (project_key, key) = Self::keys(prior)?;
        session
            .client
            .environments()
            .delete(&project_key, &key)
            .await
            .during("delete", Self::NOUN, &ENVIRONMENT_ID.join(&[&project_key, &key]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_session;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn config() -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("project_key", Dynamic::from("web")),
            ("key", Dynamic::from("staging")),
            ("name", Dynamic::from("Staging")),
            ("color", Dynamic::from("00ff00")),
            ("default_ttl", Dynamic::Number(10.0)),
        ]))
    }

    fn env_body() -> serde_json::Value {
        json!({
            "_id": "client-side-123",
            "key": "staging",
            "name": "Staging",
            "color": "00ff00",
            "apiKey": "sdk-abc",
            "mobKey": "mob-abc",
            "defaultTtl": 10,
            "secureMode": false,
            "tags": []
        })
    }

    #[tokio::test]
    async fn create_checks_project_posts_then_patches() {
        let mut server = Server::new_async().await;
        let project = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"key": "web", "name": "Web"}).to_string())
            .create_async()
            .await;
        let post = server
            .mock("POST", "/api/v2/projects/web/environments")
            .match_body(Matcher::PartialJson(json!({"key": "staging", "defaultTtl": 10})))
            .with_status(201)
            .with_body(env_body().to_string())
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/api/v2/projects/web/environments/staging")
            .with_status(200)
            .with_body(env_body().to_string())
            .create_async()
            .await;
        let get = server
            .mock("GET", "/api/v2/projects/web/environments/staging")
            .with_status(200)
            .with_body(env_body().to_string())
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let state = EnvironmentResource.create(&session, &config()).await.unwrap();

        project.assert_async().await;
        post.assert_async().await;
        patch.assert_async().await;
        get.assert_async().await;
        let attrs = Attrs::of(&state);
        assert_eq!(attrs.string("id").as_deref(), Some("web/staging"));
        assert_eq!(attrs.string("client_side_id").as_deref(), Some("client-side-123"));
        assert_eq!(attrs.int("default_ttl"), Some(10));
    }

    #[tokio::test]
    async fn create_fails_without_project() {
        let mut server = Server::new_async().await;
        let _project = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(json!({"code": "not_found", "message": "Unknown project"}).to_string())
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let err = EnvironmentResource.create(&session, &config()).await.unwrap_err();
        assert_eq!(err.to_string(), r#"cannot find project with key "web""#);
    }

    #[tokio::test]
    async fn failed_settings_patch_deletes_environment() {
        let mut server = Server::new_async().await;
        let _project = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"key": "web", "name": "Web"}).to_string())
            .create_async()
            .await;
        let _post = server
            .mock("POST", "/api/v2/projects/web/environments")
            .with_status(201)
            .with_body(env_body().to_string())
            .create_async()
            .await;
        let _patch = server
            .mock("PATCH", "/api/v2/projects/web/environments/staging")
            .with_status(400)
            .with_body(json!({"code": "invalid_request", "message": "bad color"}).to_string())
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/api/v2/projects/web/environments/staging")
            .with_status(204)
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let err = EnvironmentResource.create(&session, &config()).await.unwrap_err();
        delete.assert_async().await;
        assert!(err.to_string().contains("bad color"));
    }

    #[tokio::test]
    async fn update_applies_approval_settings() {
        let mut server = Server::new_async().await;
        let patch = server
            .mock("PATCH", "/api/v2/projects/web/environments/staging")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""path":"/approvalSettings/minNumApprovals","value":2"#.to_string()),
                Matcher::Regex(
                    r#""path":"/approvalSettings/requiredApprovalTags","value":\["sensitive"\]"#.to_string(),
                ),
            ]))
            .with_status(200)
            .with_body(env_body().to_string())
            .create_async()
            .await;
        let mut body = env_body();
        body["approvalSettings"] = json!({
            "required": false,
            "minNumApprovals": 2,
            "requiredApprovalTags": ["sensitive"]
        });
        let _get = server
            .mock("GET", "/api/v2/projects/web/environments/staging")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let mut next = config();
        if let Dynamic::Map(fields) = &mut next.value {
            fields.insert(
                "approval_settings".to_string(),
                Dynamic::List(vec![Dynamic::object([
                    ("min_num_approvals", Dynamic::from(2_i64)),
                    ("required_approval_tags", Dynamic::string_list(["sensitive"])),
                ])]),
            );
        }
        let session = create_test_session(&server.url());
        let state = EnvironmentResource.update(&session, &config(), &next).await.unwrap();
        patch.assert_async().await;

        let approvals = Attrs::of(&state).block("approval_settings").unwrap();
        assert_eq!(approvals.int("min_num_approvals"), Some(2));
        assert_eq!(approvals.bool("can_apply_declined_changes"), Some(true));
    }

    #[tokio::test]
    async fn read_of_missing_environment_is_absent() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/api/v2/projects/web/environments/staging")
            .with_status(404)
            .create_async()
            .await;
        let session = create_test_session(&server.url());
        let state = EnvironmentResource.read(&session, &config()).await.unwrap();
        assert!(state.is_none());
    }

    #[test]
    fn import_splits_project_and_key() {
        let attributes = EnvironmentResource::import("web/staging").unwrap();
        assert_eq!(attributes[1].1, "staging");
        let err = EnvironmentResource::import("web").unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"found unexpected environment id format: "web" expected format: 'project_key/env_key'"#
        );
    }
}
