//! Resource implementations

pub mod attributes;
pub mod error;
pub mod managed;

pub mod resource_ai_config;
pub mod resource_audit_log_subscription;
pub mod resource_custom_role;
pub mod resource_destination;
pub mod resource_environment;
pub mod resource_feature_flag;
pub mod resource_feature_flag_environment;
pub mod resource_flag_trigger;
pub mod resource_metric;
pub mod resource_project;
pub mod resource_release_policy;
pub mod resource_segment;
pub mod resource_team;
pub mod resource_team_member;
pub mod resource_webhook;

use managed::{ManagedResource, Orchestrator};
use std::collections::HashMap;
use tfplug::provider::{ProviderResource, ResourceFactory};

pub use error::ResourceError;

pub type ProjectResource = ManagedResource<resource_project::ProjectResource>;
pub type EnvironmentResource = ManagedResource<resource_environment::EnvironmentResource>;
pub type FeatureFlagResource = ManagedResource<resource_feature_flag::FeatureFlagResource>;
pub type FeatureFlagEnvironmentResource =
    ManagedResource<resource_feature_flag_environment::FeatureFlagEnvironmentResource>;
pub type SegmentResource = ManagedResource<resource_segment::SegmentResource>;
pub type MetricResource = ManagedResource<resource_metric::MetricResource>;
pub type WebhookResource = ManagedResource<resource_webhook::WebhookResource>;
pub type CustomRoleResource = ManagedResource<resource_custom_role::CustomRoleResource>;
pub type TeamResource = ManagedResource<resource_team::TeamResource>;
pub type TeamMemberResource = ManagedResource<resource_team_member::TeamMemberResource>;
pub type DestinationResource = ManagedResource<resource_destination::DestinationResource>;
pub type FlagTriggerResource = ManagedResource<resource_flag_trigger::FlagTriggerResource>;
pub type ReleasePolicyResource = ManagedResource<resource_release_policy::ReleasePolicyResource>;
pub type AiConfigResource = ManagedResource<resource_ai_config::AiConfigResource>;
pub type AuditLogSubscriptionResource =
    ManagedResource<resource_audit_log_subscription::AuditLogSubscriptionResource>;

fn register<O: Orchestrator>(factories: &mut HashMap<String, ResourceFactory>) {
    factories.insert(
        O::TYPE_NAME.to_string(),
        Box::new(|| Box::new(ManagedResource::<O>::new()) as Box<dyn ProviderResource>),
    );
}

/// One factory per resource type, keyed by type name.
pub fn factories() -> HashMap<String, ResourceFactory> {
    let mut factories = HashMap::new();
    register::<resource_project::ProjectResource>(&mut factories);
    register::<resource_environment::EnvironmentResource>(&mut factories);
    register::<resource_feature_flag::FeatureFlagResource>(&mut factories);
    register::<resource_feature_flag_environment::FeatureFlagEnvironmentResource>(&mut factories);
    register::<resource_segment::SegmentResource>(&mut factories);
    register::<resource_metric::MetricResource>(&mut factories);
    register::<resource_webhook::WebhookResource>(&mut factories);
    register::<resource_custom_role::CustomRoleResource>(&mut factories);
    register::<resource_team::TeamResource>(&mut factories);
    register::<resource_team_member::TeamMemberResource>(&mut factories);
    register::<resource_destination::DestinationResource>(&mut factories);
    register::<resource_flag_trigger::FlagTriggerResource>(&mut factories);
    register::<resource_release_policy::ReleasePolicyResource>(&mut factories);
    register::<resource_ai_config::AiConfigResource>(&mut factories);
    register::<resource_audit_log_subscription::AuditLogSubscriptionResource>(&mut factories);
    factories
}
