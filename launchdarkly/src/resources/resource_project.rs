use super::attributes::{id, key, optional_bool, required_string, tags};
use super::error::{rollback_on_error, ApiContext, ResourceError};
use super::managed::{key_or_id, read_back, seeded, Orchestrator};
use super::resource_environment::{check_project_approvals, environment_block};
use crate::api::common::{patch_replace, PatchOperation};
use crate::api::projects::{Project, ProjectPost};
use crate::api::Client;
use crate::convert::environments::{
    environment_hash, environment_identities, environment_patches, environment_post,
    environment_posts, environments_to_config, find_environment,
};
use crate::convert::{key_hash, string_list, Attrs, ConvertError};
use crate::provider_data::Session;
use async_trait::async_trait;
use std::collections::HashSet;
use tfplug::schema::{NestedBlock, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tracing::debug;

pub fn project_schema() -> Schema {
    SchemaBuilder::new()
        .description("Manages a project and its environments")
        .attribute(id())
        .attribute(key("key", "Unique key of the project"))
        .attribute(required_string("name", "Display name"))
        .attribute(tags())
        .attribute(optional_bool(
            "include_in_snippet",
            "Make new flags available to client-side SDKs by default",
        ))
        .block(NestedBlock::list("environments", environment_block()).min_items(1))
        .build()
}

/// Project-level settings, applied after creation and on every update.
fn project_patches(attrs: Attrs<'_>) -> Vec<PatchOperation> {
    vec![
        patch_replace("/name", attrs.str_or_empty("name")),
        patch_replace("/tags", attrs.strings("tags")),
        patch_replace(
            "/includeInSnippetByDefault",
            attrs.bool_or("include_in_snippet", false),
        ),
    ]
}

/// `configured` fixes the order of environments in state.
pub fn project_to_state(project: &Project, prior_environments: &[Dynamic]) -> Dynamic {
    Dynamic::object([
        ("id", Dynamic::from(project.key.as_str())),
        ("key", Dynamic::from(project.key.as_str())),
        ("name", Dynamic::from(project.name.as_str())),
        ("tags", string_list(&project.tags)),
        (
            "include_in_snippet",
            Dynamic::from(project.include_in_snippet_by_default),
        ),
        (
            "environments",
            environments_to_config(project.environment_list(), prior_environments),
        ),
    ])
}

/// Brings every configured environment in line with `attrs`, creating the
/// ones whose identity `existing` lacks. `prior` holds the environment
/// blocks as last applied.
async fn sync_environments(
    client: &Client,
    project_key: &str,
    attrs: Attrs<'_>,
    existing: &HashSet<u64>,
    prior: &[Dynamic],
) -> Result<(), ResourceError> {
    for env in attrs.blocks("environments") {
        let env_key = env.str_or_empty("key");
        let id = format!("{}/{}", project_key, env_key);
        if !existing.contains(&environment_hash(env.raw())) {
            debug!(project = project_key, environment = %env_key, "adding environment");
            client
                .environments()
                .create(project_key, &environment_post(env)?)
                .await
                .during("create", "environment", &id)?;
        }
        client
            .environments()
            .patch(
                project_key,
                &env_key,
                &environment_patches(env, find_environment(prior, &env_key))?,
            )
            .await
            .during("update", "environment", &id)?;
    }
    Ok(())
}

#[derive(Default)]
pub struct ProjectResource;

#[async_trait]
impl Orchestrator for ProjectResource {
    const TYPE_NAME: &'static str = "launchdarkly_project";
    const NOUN: &'static str = "project";

    fn schema() -> Schema {
        project_schema()
    }

    fn validate(config: &DynamicValue) -> Result<(), ConvertError> {
        check_project_approvals(Attrs::of(config))
    }

    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError> {
        if id.is_empty() {
            return Err(ConvertError::validation("project import ID must be the project key"));
        }
        Ok(vec![(AttributePath::new("key"), id.to_string())])
    }

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let key = attrs.str_or_empty("key");

        let post = ProjectPost {
            key: key.clone(),
            name: attrs.str_or_empty("name"),
            tags: attrs.strings("tags"),
            environments: environment_posts(attrs.list("environments"))?,
        };
        client
            .projects()
            .create(&post)
            .await
            .during("create", Self::NOUN, &key)?;

        let settings = async {
            client
                .projects()
                .patch(&key, &project_patches(attrs))
                .await
                .during("update", Self::NOUN, &key)?;
            let created: HashSet<u64> = post.environments.iter().map(|e| key_hash(&e.key)).collect();
            sync_environments(client, &key, attrs, &created, &[]).await
        };
        rollback_on_error(settings.await, Self::NOUN, &key, client.projects().delete(&key)).await?;

        read_back(self, session, &seeded(config, &key), "create", &key).await
    }

    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError> {
        let attrs = Attrs::of(state);
        let key = key_or_id(attrs, "key");
        Ok(session
            .client
            .projects()
            .get(&key)
            .await
            .absent_during("read", Self::NOUN, &key)?
            .map(|project| DynamicValue::new(project_to_state(&project, attrs.list("environments")))))
    }

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError> {
        let client = &session.client;
        let attrs = Attrs::of(config);
        let key = key_or_id(Attrs::of(prior), "key");

        client
            .projects()
            .patch(&key, &project_patches(attrs))
            .await
            .during("update", Self::NOUN, &key)?;

        let prior_attrs = Attrs::of(prior);
        let previous = environment_identities(prior_attrs.list("environments"));
        sync_environments(client, &key, attrs, &previous, prior_attrs.list("environments")).await?;

        let wanted = environment_identities(attrs.list("environments"));
        let dropped = prior_attrs
            .blocks("environments")
            .into_iter()
            .filter(|env| !wanted.contains(&environment_hash(env.raw())));
        for env in dropped {
            let env_key = env.str_or_empty("key");
            debug!(project = %key, environment = %env_key, "removing environment");
            client
                .environments()
                .delete(&key, &env_key)
                .await
                .absent_during("delete", "environment", &format!("{}/{}", key, env_key))?;
        }

        read_back(self, session, &seeded(config, &key), "update", &key).await
    }

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError> {
        let key = key_or_id(Attrs::of(prior), "key");
        session
            .client
            .projects()
            .delete(&key)
            .await
            .during("delete", Self::NOUN, &key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_session;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn env(key: &str) -> Dynamic {
        Dynamic::object([
            ("key", Dynamic::from(key)),
            ("name", Dynamic::from(key)),
            ("color", Dynamic::from("000000")),
        ])
    }

    fn config(envs: Vec<Dynamic>) -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("key", Dynamic::from("web")),
            ("name", Dynamic::from("Web")),
            ("tags", Dynamic::string_list(["frontend"])),
            ("include_in_snippet", Dynamic::from(true)),
            ("environments", Dynamic::List(envs)),
        ]))
    }

    fn project_body(envs: &[&str]) -> String {
        let items: Vec<_> = envs
            .iter()
            .map(|k| json!({"_id": format!("id-{}", k), "key": k, "name": k, "color": "000000"}))
            .collect();
        json!({
            "_id": "p1",
            "key": "web",
            "name": "Web",
            "tags": ["frontend"],
            "includeInSnippetByDefault": true,
            "environments": {"items": items}
        })
        .to_string()
    }

    fn keys_of(state: &DynamicValue) -> Vec<String> {
        Attrs::of(state)
            .blocks("environments")
            .iter()
            .filter_map(|e| e.string("key"))
            .collect()
    }

    #[tokio::test]
    async fn create_posts_environments_and_reads_them_in_config_order() {
        let mut server = Server::new_async().await;
        let post = server
            .mock("POST", "/api/v2/projects")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"key": "web", "name": "Web"})),
                Matcher::Regex(r#""key":"production".*"key":"dev""#.to_string()),
            ]))
            .with_status(201)
            .with_body(project_body(&["production", "dev"]))
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/api/v2/projects/web")
            .match_body(Matcher::Regex(
                r#""path":"/includeInSnippetByDefault","value":true"#.to_string(),
            ))
            .with_status(200)
            .with_body(project_body(&["production", "dev"]))
            .create_async()
            .await;
        let env_patches = server
            .mock("PATCH", Matcher::Regex(r"^/api/v2/projects/web/environments/".to_string()))
            .with_status(200)
            .with_body(json!({"key": "dev", "name": "dev"}).to_string())
            .expect(2)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(project_body(&["dev", "production", "qa"]))
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let state = ProjectResource
            .create(&session, &config(vec![env("production"), env("dev")]))
            .await
            .unwrap();

        post.assert_async().await;
        patch.assert_async().await;
        env_patches.assert_async().await;
        assert_eq!(keys_of(&state), vec!["production", "dev", "qa"]);
        assert_eq!(Attrs::of(&state).bool("include_in_snippet"), Some(true));
    }

    #[tokio::test]
    async fn update_adds_and_removes_environments() {
        let mut server = Server::new_async().await;
        let _patch = server
            .mock("PATCH", "/api/v2/projects/web")
            .with_status(200)
            .with_body(project_body(&["production", "dev"]))
            .create_async()
            .await;
        let create_env = server
            .mock("POST", "/api/v2/projects/web/environments")
            .match_body(Matcher::PartialJson(json!({"key": "qa"})))
            .with_status(201)
            .with_body(json!({"key": "qa", "name": "qa"}).to_string())
            .create_async()
            .await;
        let _env_patches = server
            .mock("PATCH", Matcher::Regex(r"^/api/v2/projects/web/environments/".to_string()))
            .with_status(200)
            .with_body(json!({"key": "qa", "name": "qa"}).to_string())
            .create_async()
            .await;
        let delete_env = server
            .mock("DELETE", "/api/v2/projects/web/environments/dev")
            .with_status(204)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(project_body(&["production", "qa"]))
            .create_async()
            .await;

        let session = create_test_session(&server.url());
        let prior = config(vec![env("production"), env("dev")]);
        let state = ProjectResource
            .update(&session, &prior, &config(vec![env("production"), env("qa")]))
            .await
            .unwrap();

        create_env.assert_async().await;
        delete_env.assert_async().await;
        assert_eq!(keys_of(&state), vec!["production", "qa"]);
    }

    #[tokio::test]
    async fn recolored_environment_is_patched_in_place() {
        let mut server = Server::new_async().await;
        let _patch = server
            .mock("PATCH", "/api/v2/projects/web")
            .with_status(200)
            .with_body(project_body(&["production"]))
            .create_async()
            .await;
        let create_env = server
            .mock("POST", "/api/v2/projects/web/environments")
            .expect(0)
            .create_async()
            .await;
        let delete_env = server
            .mock("DELETE", Matcher::Regex(r"^/api/v2/projects/web/environments/".to_string()))
            .expect(0)
            .create_async()
            .await;
        let env_patch = server
            .mock("PATCH", "/api/v2/projects/web/environments/production")
            .match_body(Matcher::Regex(r#""path":"/color","value":"00ff00""#.to_string()))
            .with_status(200)
            .with_body(json!({"key": "production", "name": "production"}).to_string())
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(project_body(&["production"]))
            .create_async()
            .await;

        let recolored = Dynamic::object([
            ("key", Dynamic::from("production")),
            ("name", Dynamic::from("production")),
            ("color", Dynamic::from("00ff00")),
        ]);
        let session = create_test_session(&server.url());
        ProjectResource
            .update(&session, &config(vec![env("production")]), &config(vec![recolored]))
            .await
            .unwrap();

        env_patch.assert_async().await;
        create_env.assert_async().await;
        delete_env.assert_async().await;
    }

    #[tokio::test]
    async fn read_missing_project_is_absent() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/api/v2/projects/web")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let session = create_test_session(&server.url());
        let state = ProjectResource.read(&session, &config(vec![])).await.unwrap();
        assert!(state.is_none());
    }

    #[test]
    fn embedded_environment_approvals_are_validated() {
        let gated = Dynamic::object([
            ("key", Dynamic::from("production")),
            ("name", Dynamic::from("Production")),
            ("color", Dynamic::from("ff0000")),
            (
                "approval_settings",
                Dynamic::List(vec![Dynamic::object([
                    ("required", Dynamic::from(true)),
                    ("required_approval_tags", Dynamic::string_list(["sensitive"])),
                ])]),
            ),
        ]);
        let err = ProjectResource::validate(&config(vec![env("dev"), gated])).unwrap_err();
        assert!(err.to_string().contains("cannot be set simultaneously"));
        assert!(ProjectResource::validate(&config(vec![env("dev")])).is_ok());
    }

    #[test]
    fn project_patches_always_send_snippet_flag() {
        let value = config(vec![]);
        let paths: Vec<String> = project_patches(Attrs::of(&value))
            .into_iter()
            .map(|p| p.path)
            .collect();
        assert_eq!(paths, vec!["/name", "/tags", "/includeInSnippetByDefault"]);
    }
}
