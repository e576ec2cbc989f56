//! Test helpers for the LaunchDarkly API

use super::client::{Client, Credentials, RetryConfig};

/// Retry settings that keep tests fast: two retries, millisecond waits.
pub fn fast_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        max_conflict_retries: 2,
        conflict_jitter_ms: (1, 3),
        max_rate_limit_wait_ms: 5,
        timeout_seconds: 5,
    }
}

#[allow(clippy::disallowed_methods)]
pub fn create_test_client(url: &str) -> Client {
    Client::with_config(
        url,
        Credentials::AccessToken("api-token".to_string()),
        fast_retry_config(),
    )
    .unwrap()
}

/// Session over a test client, as resources see it during one call.
pub fn create_test_session(url: &str) -> crate::provider_data::Session {
    crate::provider_data::LaunchDarklyProviderData::new(create_test_client(url))
        .session(&tfplug::context::Context::new())
}
