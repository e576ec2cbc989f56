use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tfplug::Context;

use super::common::{ApiErrorBody, ApiQueryParams, PatchOperation, PatchWithComment, SemanticPatch};
use super::error::ApiError;

pub const API_VERSION: &str = "20240415";
pub const BETA_API_VERSION: &str = "beta";
pub const DEFAULT_API_HOST: &str = "https://app.launchdarkly.com";

const JSON: &str = "application/json";
const SEMANTIC_PATCH: &str = "application/json; domain-model=launchdarkly.semanticpatch";

/// LaunchDarkly REST API client.
///
/// Cheap to clone. [`Client::scoped`] binds a request [`Context`] so every
/// call made through the returned handle stops when the context is cancelled.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
    api_version: &'static str,
    ctx: Option<Context>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: HeaderValue,
    retry_config: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// 409s are retried separately, after a short random pause
    pub max_conflict_retries: u32,
    pub conflict_jitter_ms: (u64, u64),
    /// Upper bound on a single wait derived from `X-RateLimit-Reset`
    pub max_rate_limit_wait_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 12,
            initial_backoff_ms: 200,
            max_backoff_ms: 10000,
            max_conflict_retries: 5,
            conflict_jitter_ms: (200, 500),
            max_rate_limit_wait_ms: 60000,
            timeout_seconds: 20,
        }
    }
}

/// How to authenticate against the API
#[derive(Debug, Clone)]
pub enum Credentials {
    AccessToken(String),
    OAuthToken(String),
}

impl Credentials {
    fn header_value(&self) -> Result<HeaderValue, ApiError> {
        let raw = match self {
            Credentials::AccessToken(token) => token.clone(),
            Credentials::OAuthToken(token) => format!("Bearer {}", token),
        };
        let mut value = HeaderValue::from_str(&raw)
            .map_err(|_| ApiError::InvalidCredentials("token contains invalid header characters".into()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Normalizes a configured host into a base URL: adds `https://` when no
/// scheme is given and drops any path or trailing slash.
pub fn normalize_host(host: &str) -> Result<String, ApiError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ApiError::InvalidHost("host cannot be empty".to_string()));
    }
    let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    let parsed = url::Url::parse(&with_scheme)
        .map_err(|e| ApiError::InvalidHost(format!("{}: {}", host, e)))?;
    let hostname = parsed
        .host_str()
        .ok_or_else(|| ApiError::InvalidHost(host.to_string()))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), hostname, port),
        None => format!("{}://{}", parsed.scheme(), hostname),
    })
}

impl Client {
    pub fn new(api_host: &str, credentials: Credentials) -> Result<Self, ApiError> {
        Self::with_config(api_host, credentials, RetryConfig::default())
    }

    pub fn with_config(
        api_host: &str,
        credentials: Credentials,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: normalize_host(api_host)?,
                auth_header: credentials.header_value()?,
                retry_config,
            }),
            api_version: API_VERSION,
            ctx: None,
        })
    }

    /// Same client, but every request is bound to `ctx`.
    pub fn scoped(&self, ctx: &Context) -> Self {
        Self {
            ctx: Some(ctx.clone()),
            ..self.clone()
        }
    }

    /// Same client, sending `LD-API-Version: beta`.
    pub fn beta(&self) -> Self {
        Self {
            api_version: BETA_API_VERSION,
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn api_version(&self) -> &str {
        self.api_version
    }

    pub fn projects(&self) -> super::projects::ProjectsApi<'_> {
        super::projects::ProjectsApi::new(self)
    }

    pub fn environments(&self) -> super::environments::EnvironmentsApi<'_> {
        super::environments::EnvironmentsApi::new(self)
    }

    pub fn flags(&self) -> super::flags::FlagsApi<'_> {
        super::flags::FlagsApi::new(self)
    }

    pub fn segments(&self) -> super::segments::SegmentsApi<'_> {
        super::segments::SegmentsApi::new(self)
    }

    pub fn metrics(&self) -> super::metrics::MetricsApi<'_> {
        super::metrics::MetricsApi::new(self)
    }

    pub fn webhooks(&self) -> super::webhooks::WebhooksApi<'_> {
        super::webhooks::WebhooksApi::new(self)
    }

    pub fn custom_roles(&self) -> super::custom_roles::CustomRolesApi<'_> {
        super::custom_roles::CustomRolesApi::new(self)
    }

    pub fn members(&self) -> super::members::MembersApi<'_> {
        super::members::MembersApi::new(self)
    }

    pub fn destinations(&self) -> super::destinations::DestinationsApi<'_> {
        super::destinations::DestinationsApi::new(self)
    }

    pub fn teams(&self) -> super::teams::TeamsApi<'_> {
        super::teams::TeamsApi::new(self)
    }

    pub fn triggers(&self) -> super::triggers::TriggersApi<'_> {
        super::triggers::TriggersApi::new(self)
    }

    /// Release policies live behind the beta API version.
    pub fn release_policies(&self) -> super::release_policies::ReleasePoliciesApi {
        super::release_policies::ReleasePoliciesApi::new(self.beta())
    }

    /// AI configs live behind the beta API version.
    pub fn ai_configs(&self) -> super::ai_configs::AiConfigsApi {
        super::ai_configs::AiConfigsApi::new(self.beta())
    }

    pub fn audit_log_subscriptions(
        &self,
    ) -> super::audit_log_subscriptions::AuditLogSubscriptionsApi<'_> {
        super::audit_log_subscriptions::AuditLogSubscriptionsApi::new(self)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::GET, path, None, JSON).await
    }

    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.get(&full_path).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_vec(body)?;
        self.execute(Method::POST, path, Some(body), JSON).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_vec(body)?;
        self.execute(Method::PUT, path, Some(body), JSON).await
    }

    /// PATCH with a plain JSON patch array
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        ops: &[PatchOperation],
    ) -> Result<T, ApiError> {
        let body = serde_json::to_vec(ops)?;
        self.execute(Method::PATCH, path, Some(body), JSON).await
    }

    /// PATCH with `{comment, patch}`
    pub async fn patch_with_comment<T: DeserializeOwned>(
        &self,
        path: &str,
        patch: &PatchWithComment,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_vec(patch)?;
        self.execute(Method::PATCH, path, Some(body), JSON).await
    }

    /// PATCH with a JSON merge body
    pub async fn patch_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_vec(body)?;
        self.execute(Method::PATCH, path, Some(body), JSON).await
    }

    pub async fn patch_semantic<T: DeserializeOwned>(
        &self,
        path: &str,
        patch: &SemanticPatch,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_vec(patch)?;
        self.execute(Method::PATCH, path, Some(body), SEMANTIC_PATCH)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, None, JSON).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        content_type: &'static str,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, path);
        let response = self
            .execute_with_retry(
                || {
                    tracing::debug!("{} request to: {}", method, url);
                    let mut request = self
                        .inner
                        .http_client
                        .request(method.clone(), &url)
                        .header(AUTHORIZATION, self.inner.auth_header.clone())
                        .header("LD-API-Version", self.api_version)
                        .header(USER_AGENT, user_agent());
                    if let Some(body) = &body {
                        request = request
                            .header(CONTENT_TYPE, content_type)
                            .body(body.clone());
                    }
                    request.send()
                },
                path,
            )
            .await?;
        self.parse_success_response(response).await
    }

    /// Sends the request produced by `request_fn`, retrying rate limits,
    /// conflicts, server errors and connection failures.
    async fn execute_with_retry<F, Fut>(
        &self,
        request_fn: F,
        path: &str,
    ) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let config = &self.inner.retry_config;
        let mut attempt: u32 = 0;
        let mut conflicts: u32 = 0;

        loop {
            if self.ctx.as_ref().is_some_and(Context::is_cancelled) {
                return Err(ApiError::Cancelled);
            }

            let (error, wait) = match self.cancellable(request_fn()).await? {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    match status {
                        StatusCode::UNAUTHORIZED => return Err(ApiError::AuthError),
                        StatusCode::CONFLICT => {
                            if conflicts >= config.max_conflict_retries {
                                return Err(ApiError::Conflict);
                            }
                            conflicts += 1;
                            tracing::debug!("received a 409 conflict from {}, retrying", path);
                            let (lo, hi) = config.conflict_jitter_ms;
                            let wait = Duration::from_millis(fastrand::u64(lo..hi.max(lo + 1)));
                            self.sleep(wait).await?;
                            continue;
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            let wait = rate_limit_wait(&response, config);
                            (ApiError::RateLimited, wait)
                        }
                        s if s.is_server_error() => (ApiError::ServiceUnavailable, None),
                        _ => return Err(self.handle_error_response(response).await),
                    }
                }
                Err(e) if e.is_timeout() => (ApiError::Timeout(config.timeout_seconds), None),
                Err(e) if e.is_connect() => (ApiError::RequestError(e), None),
                Err(e) => return Err(ApiError::RequestError(e)),
            };

            if attempt >= config.max_retries {
                return Err(error);
            }
            attempt += 1;

            let wait = wait.unwrap_or_else(|| backoff(config, attempt));
            tracing::debug!(
                "Retrying request to {} after {}ms (attempt {}): {}",
                path,
                wait.as_millis(),
                attempt,
                error
            );
            self.sleep(wait).await?;
        }
    }

    /// Races `fut` against the bound context, if any.
    async fn cancellable<Fut: std::future::Future>(&self, fut: Fut) -> Result<Fut::Output, ApiError> {
        match &self.ctx {
            Some(ctx) => tokio::select! {
                out = fut => Ok(out),
                _ = ctx.cancelled() => Err(ApiError::Cancelled),
            },
            None => Ok(fut.await),
        }
    }

    async fn sleep(&self, wait: Duration) -> Result<(), ApiError> {
        self.cancellable(tokio::time::sleep(wait)).await
    }

    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!(bytes = text.len(), "API response received");

        let text = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str::<T>(text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}", e);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let details = serde_json::from_str::<ApiErrorBody>(&text).ok();
        let message = details
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or(text);

        ApiError::ApiError {
            status,
            message,
            details: details.map(Box::new),
        }
    }
}

fn user_agent() -> String {
    format!("launchdarkly-terraform-provider/{}", env!("CARGO_PKG_VERSION"))
}

fn backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(
        config
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(config.max_backoff_ms),
    )
}

/// Wait derived from `X-RateLimit-Reset` (epoch millis) plus jitter. The
/// header sometimes lies in the past; the distance is used either way.
fn rate_limit_wait(response: &reqwest::Response, config: &RetryConfig) -> Option<Duration> {
    let reset_ms: i64 = response
        .headers()
        .get("X-RateLimit-Reset")?
        .to_str()
        .ok()?
        .parse()
        .ok()?;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()?
        .as_millis() as i64;
    let distance = reset_ms.saturating_sub(now_ms).unsigned_abs();
    let jitter = if distance > 0 {
        fastrand::u64(0..distance)
    } else {
        0
    };
    Some(Duration::from_millis(
        distance
            .saturating_add(jitter)
            .min(config.max_rate_limit_wait_ms),
    ))
}
