//! Provider trait and factories

use crate::context::Context;
use crate::data_source::DataSourceWithConfigure;
use crate::resource::{ResourceWithConfigure, ResourceWithExists, ResourceWithImportState};
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything the host needs from a managed resource.
pub trait ProviderResource:
    ResourceWithConfigure + ResourceWithImportState + ResourceWithExists
{
}

impl<T> ProviderResource for T where
    T: ResourceWithConfigure + ResourceWithImportState + ResourceWithExists
{
}

/// Builds a fresh, unconfigured resource. The host calls `configure` on it
/// with the provider data before any lifecycle method.
pub type ResourceFactory = Box<dyn Fn() -> Box<dyn ProviderResource> + Send + Sync>;

pub type DataSourceFactory = Box<dyn Fn() -> Box<dyn DataSourceWithConfigure> + Send + Sync>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Prefix shared by all resource type names, e.g. `launchdarkly`
    fn type_name(&self) -> &str;

    async fn schema(&self, ctx: Context, request: ProviderSchemaRequest) -> ProviderSchemaResponse;

    /// Builds the shared client. `provider_data` is handed to every resource
    /// and data source through their `configure` methods.
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    fn resources(&self) -> HashMap<String, ResourceFactory>;

    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ProviderSchemaRequest;

pub struct ProviderSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureProviderRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}
