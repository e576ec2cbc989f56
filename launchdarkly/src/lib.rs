pub mod api;
pub mod convert;
pub mod data_sources;
pub mod logging;
pub mod provider_data;
pub mod resources;

use api::client::DEFAULT_API_HOST;
use api::{Client, Credentials, RetryConfig};
use async_trait::async_trait;
use convert::Attrs;
use provider_data::LaunchDarklyProviderData;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::Diagnostic;
use tfplug::validator::NumberRangeValidator;
use tracing::debug;

pub const ACCESS_TOKEN_ENV: &str = "LAUNCHDARKLY_ACCESS_TOKEN";
pub const OAUTH_TOKEN_ENV: &str = "LAUNCHDARKLY_OAUTH_TOKEN";
pub const API_HOST_ENV: &str = "LAUNCHDARKLY_API_HOST";
pub const HTTP_TIMEOUT_ENV: &str = "LAUNCHDARKLY_HTTP_TIMEOUT";

const DEFAULT_HTTP_TIMEOUT: u64 = 20;

#[derive(Default)]
pub struct LaunchDarklyProvider {
    provider_data: Option<LaunchDarklyProviderData>,
}

impl LaunchDarklyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema() -> Schema {
        SchemaBuilder::new()
            .description("Manages LaunchDarkly projects, flags and account objects")
            .attribute(
                AttributeBuilder::new("access_token", AttributeType::String)
                    .description("Personal or service access token; defaults to LAUNCHDARKLY_ACCESS_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("oauth_token", AttributeType::String)
                    .description("OAuth token; defaults to LAUNCHDARKLY_OAUTH_TOKEN")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_host", AttributeType::String)
                    .description("LaunchDarkly host; defaults to LAUNCHDARKLY_API_HOST or https://app.launchdarkly.com")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("http_timeout", AttributeType::Number)
                    .description("HTTP timeout in seconds; defaults to LAUNCHDARKLY_HTTP_TIMEOUT or 20")
                    .optional()
                    .validator(NumberRangeValidator::new(Some(1.0), None))
                    .build(),
            )
            .build()
    }

    pub fn provider_data(&self) -> Option<&LaunchDarklyProviderData> {
        self.provider_data.as_ref()
    }
}

/// Configured value, then the environment. Empty strings count as unset.
fn setting(attrs: Attrs<'_>, name: &str, env: &str) -> Option<String> {
    attrs
        .non_empty(name)
        .or_else(|| std::env::var(env).ok().filter(|v| !v.trim().is_empty()))
}

fn credentials(attrs: Attrs<'_>) -> Result<Credentials, Diagnostic> {
    match (
        setting(attrs, "access_token", ACCESS_TOKEN_ENV),
        setting(attrs, "oauth_token", OAUTH_TOKEN_ENV),
    ) {
        (Some(token), None) => Ok(Credentials::AccessToken(token)),
        (None, Some(token)) => Ok(Credentials::OAuthToken(token)),
        (Some(_), Some(_)) => Err(Diagnostic::error(
            "Conflicting credentials",
            "only one of access_token and oauth_token may be set",
        )),
        (None, None) => Err(Diagnostic::error(
            "Missing credentials",
            format!(
                "either access_token or oauth_token is required (set in provider config or {} / {})",
                ACCESS_TOKEN_ENV, OAUTH_TOKEN_ENV
            ),
        )),
    }
}

fn http_timeout(attrs: Attrs<'_>) -> Result<u64, Diagnostic> {
    if let Some(seconds) = attrs.int("http_timeout") {
        return u64::try_from(seconds)
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| Diagnostic::error("Invalid http_timeout", "http_timeout must be positive"));
    }
    match std::env::var(HTTP_TIMEOUT_ENV) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| {
                Diagnostic::error(
                    "Invalid http_timeout",
                    format!("{} must be a positive number of seconds, got {:?}", HTTP_TIMEOUT_ENV, raw),
                )
            }),
        _ => Ok(DEFAULT_HTTP_TIMEOUT),
    }
}

fn build_client(attrs: Attrs<'_>) -> Result<Client, Diagnostic> {
    let credentials = credentials(attrs)?;
    let api_host =
        setting(attrs, "api_host", API_HOST_ENV).unwrap_or_else(|| DEFAULT_API_HOST.to_string());
    let retry_config = RetryConfig {
        timeout_seconds: http_timeout(attrs)?,
        ..RetryConfig::default()
    };
    Client::with_config(&api_host, credentials, retry_config)
        .map_err(|e| Diagnostic::error("Failed to create API client", e.to_string()))
}

#[async_trait]
impl Provider for LaunchDarklyProvider {
    fn type_name(&self) -> &str {
        "launchdarkly"
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::schema(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let mut diagnostics = Self::schema().validate_config(&request.config);
        if tfplug::types::has_errors(&diagnostics) {
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        }

        match build_client(Attrs::of(&request.config)) {
            Ok(client) => {
                debug!(host = client.base_url(), "configured LaunchDarkly client");
                let data = LaunchDarklyProviderData::new(client);
                self.provider_data = Some(data.clone());
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: Some(Arc::new(data)),
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        resources::factories()
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        data_sources::factories()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::types::{Dynamic, DynamicValue};

    const ENV_VARS: [&str; 4] = [ACCESS_TOKEN_ENV, OAUTH_TOKEN_ENV, API_HOST_ENV, HTTP_TIMEOUT_ENV];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    async fn configure(config: Dynamic) -> (LaunchDarklyProvider, ConfigureProviderResponse) {
        let mut provider = LaunchDarklyProvider::new();
        let response = provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    terraform_version: "1.9.0".to_string(),
                    config: DynamicValue::new(config),
                },
            )
            .await;
        (provider, response)
    }

    #[tokio::test]
    #[serial]
    async fn configures_from_env_vars() {
        clear_env();
        std::env::set_var(ACCESS_TOKEN_ENV, "api-123");
        std::env::set_var(API_HOST_ENV, "ld.example.com");

        let (provider, response) = configure(Dynamic::Map(Default::default())).await;
        assert!(response.diagnostics.is_empty());
        assert!(response.provider_data.is_some());
        let data = provider.provider_data().unwrap();
        assert_eq!(data.client.base_url(), "https://ld.example.com");

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn config_takes_precedence_over_env() {
        clear_env();
        std::env::set_var(API_HOST_ENV, "ignored.example.com");

        let (provider, response) = configure(Dynamic::object([
            ("access_token", Dynamic::from("api-123")),
            ("api_host", Dynamic::from("http://localhost:8080")),
        ]))
        .await;
        assert!(response.diagnostics.is_empty());
        assert_eq!(
            provider.provider_data().unwrap().client.base_url(),
            "http://localhost:8080"
        );

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn defaults_to_public_host() {
        clear_env();
        let (provider, response) =
            configure(Dynamic::object([("oauth_token", Dynamic::from("oauth-1"))])).await;
        assert!(response.diagnostics.is_empty());
        assert_eq!(provider.provider_data().unwrap().client.base_url(), DEFAULT_API_HOST);
    }

    #[tokio::test]
    #[serial]
    async fn requires_a_token() {
        clear_env();
        let (provider, response) = configure(Dynamic::Map(Default::default())).await;
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Missing credentials");
        assert!(provider.provider_data().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn rejects_both_tokens() {
        clear_env();
        std::env::set_var(OAUTH_TOKEN_ENV, "oauth-1");
        let (_, response) =
            configure(Dynamic::object([("access_token", Dynamic::from("api-123"))])).await;
        assert_eq!(response.diagnostics[0].summary, "Conflicting credentials");
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn rejects_bad_timeout_env() {
        clear_env();
        std::env::set_var(ACCESS_TOKEN_ENV, "api-123");
        std::env::set_var(HTTP_TIMEOUT_ENV, "soon");
        let (_, response) = configure(Dynamic::Map(Default::default())).await;
        assert_eq!(response.diagnostics[0].summary, "Invalid http_timeout");
        clear_env();
    }

    #[test]
    fn registers_every_type() {
        let provider = LaunchDarklyProvider::new();
        assert_eq!(provider.resources().len(), 15);
        assert_eq!(provider.data_sources().len(), 13);
        assert!(provider.resources().contains_key("launchdarkly_custom_role"));
        assert!(provider.resources().contains_key("launchdarkly_destination"));
        assert!(provider.data_sources().contains_key("launchdarkly_team_member"));
    }
}
