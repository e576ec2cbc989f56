//! Data source implementations

pub mod lookup;

use crate::resources::{
    resource_ai_config::AiConfigResource,
    resource_audit_log_subscription::AuditLogSubscriptionResource,
    resource_environment::EnvironmentResource, resource_feature_flag::FeatureFlagResource,
    resource_feature_flag_environment::FeatureFlagEnvironmentResource,
    resource_flag_trigger::FlagTriggerResource, resource_metric::MetricResource,
    resource_project::ProjectResource, resource_release_policy::ReleasePolicyResource,
    resource_segment::SegmentResource, resource_team::TeamResource,
    resource_team_member::TeamMemberResource,
    resource_webhook::WebhookResource,
};
use lookup::{Lookup, LookupDataSource};
use std::collections::HashMap;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::DataSourceFactory;

impl Lookup for ProjectResource {
    const KEYS: &'static [&'static str] = &["key"];
}

impl Lookup for EnvironmentResource {
    const KEYS: &'static [&'static str] = &["project_key", "key"];
}

impl Lookup for FeatureFlagResource {
    const KEYS: &'static [&'static str] = &["project_key", "key"];
}

impl Lookup for FeatureFlagEnvironmentResource {
    const KEYS: &'static [&'static str] = &["flag_id", "env_key"];
}

impl Lookup for SegmentResource {
    const KEYS: &'static [&'static str] = &["project_key", "env_key", "key"];
}

impl Lookup for MetricResource {
    const KEYS: &'static [&'static str] = &["project_key", "key"];
}

impl Lookup for WebhookResource {
    const KEYS: &'static [&'static str] = &["id"];
}

impl Lookup for TeamResource {
    const KEYS: &'static [&'static str] = &["key"];
}

impl Lookup for TeamMemberResource {
    const KEYS: &'static [&'static str] = &["email"];
}

impl Lookup for FlagTriggerResource {
    const KEYS: &'static [&'static str] = &["project_key", "env_key", "flag_key", "id"];
}

impl Lookup for ReleasePolicyResource {
    const KEYS: &'static [&'static str] = &["project_key", "key"];
}

impl Lookup for AiConfigResource {
    const KEYS: &'static [&'static str] = &["project_key", "key"];
}

impl Lookup for AuditLogSubscriptionResource {
    const KEYS: &'static [&'static str] = &["integration_key", "id"];
}

fn register<L: Lookup>(factories: &mut HashMap<String, DataSourceFactory>) {
    factories.insert(
        L::TYPE_NAME.to_string(),
        Box::new(|| Box::new(LookupDataSource::<L>::new()) as Box<dyn DataSourceWithConfigure>),
    );
}

/// One factory per data source type, keyed by type name.
pub fn factories() -> HashMap<String, DataSourceFactory> {
    let mut factories = HashMap::new();
    register::<ProjectResource>(&mut factories);
    register::<EnvironmentResource>(&mut factories);
    register::<FeatureFlagResource>(&mut factories);
    register::<FeatureFlagEnvironmentResource>(&mut factories);
    register::<SegmentResource>(&mut factories);
    register::<MetricResource>(&mut factories);
    register::<WebhookResource>(&mut factories);
    register::<TeamResource>(&mut factories);
    register::<TeamMemberResource>(&mut factories);
    register::<FlagTriggerResource>(&mut factories);
    register::<ReleasePolicyResource>(&mut factories);
    register::<AiConfigResource>(&mut factories);
    register::<AuditLogSubscriptionResource>(&mut factories);
    factories
}
