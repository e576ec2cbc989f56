pub mod ai_configs;
pub mod audit_log_subscriptions;
pub mod client;
pub mod common;
pub mod custom_roles;
pub mod destinations;
pub mod environments;
pub mod error;
pub mod flags;
pub mod members;
pub mod metrics;
pub mod projects;
pub mod release_policies;
pub mod segments;
pub mod teams;
pub mod triggers;
pub mod webhooks;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, Credentials, RetryConfig};
pub use common::*;
pub use error::{ApiError, ErrorKind, ResultExt};
