//! Read-only lookups built from the managed resources.
//!
//! A lookup reuses its resource's read conversion. The differences are in
//! the schema, where only the identifying keys are configurable, and in
//! absence, which is an error instead of a removal.

use crate::provider_data::LaunchDarklyProviderData;
use crate::resources::managed::Orchestrator;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{Block, Schema};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tracing::debug;

/// A resource that can also be looked up by the attributes in `KEYS`.
pub trait Lookup: Orchestrator {
    const KEYS: &'static [&'static str];
}

/// The lookup keys alone, shaped like an import seed so the read reports
/// every optional block the object has.
fn key_seed(config: &DynamicValue, keys: &[&str]) -> DynamicValue {
    DynamicValue::new(Dynamic::object(keys.iter().filter_map(|key| {
        config.value.get(key).map(|value| (key.to_string(), value.clone()))
    })))
}

fn computed_block(block: &mut Block, keys: &[&str]) {
    for attribute in &mut block.attributes {
        let is_key = keys.contains(&attribute.name.as_str());
        attribute.required = is_key;
        attribute.optional = false;
        attribute.computed = !is_key;
        attribute.force_new = false;
        attribute.default = None;
        if !is_key {
            attribute.validators.clear();
        }
    }
    for nested in &mut block.block_types {
        nested.min_items = 0;
        nested.max_items = 0;
        nested.force_new = false;
        computed_block(&mut nested.block, &[]);
    }
}

/// `schema` with only `keys` configurable and everything else computed.
pub fn lookup_schema(mut schema: Schema, keys: &[&str]) -> Schema {
    computed_block(&mut schema.block, keys);
    schema
}

pub struct LookupDataSource<L: Lookup> {
    orchestrator: L,
    provider_data: Option<LaunchDarklyProviderData>,
}

impl<L: Lookup> Default for LookupDataSource<L> {
    fn default() -> Self {
        Self {
            orchestrator: L::default(),
            provider_data: None,
        }
    }
}

impl<L: Lookup> LookupDataSource<L> {
    pub fn new() -> Self {
        Self::default()
    }

    fn failure(state: DynamicValue, summary: String, detail: String) -> ReadDataSourceResponse {
        ReadDataSourceResponse {
            state,
            diagnostics: vec![Diagnostic::error(summary, detail)],
        }
    }
}

#[async_trait]
impl<L: Lookup> DataSource for LookupDataSource<L> {
    fn type_name(&self) -> &str {
        L::TYPE_NAME
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: lookup_schema(L::schema(), L::KEYS),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: lookup_schema(L::schema(), L::KEYS).validate_config(&request.config),
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return Self::failure(
                DynamicValue::null(),
                "Provider not configured".to_string(),
                "Provider data was not properly configured".to_string(),
            );
        };
        let session = provider_data.session(&ctx);

        debug!(data_source = L::TYPE_NAME, "looking up");
        let seed = key_seed(&request.config, L::KEYS);
        match self.orchestrator.read(&session, &seed).await {
            Ok(Some(state)) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Ok(None) => Self::failure(
                DynamicValue::null(),
                format!("{} not found", L::NOUN),
                format!("no {} matches the given keys", L::NOUN),
            ),
            Err(e) => Self::failure(
                DynamicValue::null(),
                format!("Failed to read {}", L::NOUN),
                e.to_string(),
            ),
        }
    }
}

#[async_trait]
impl<L: Lookup> DataSourceWithConfigure for LookupDataSource<L> {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        if let Some(data) = request.provider_data {
            match data.downcast_ref::<LaunchDarklyProviderData>() {
                Some(provider_data) => self.provider_data = Some(provider_data.clone()),
                None => diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Expected LaunchDarklyProviderData",
                )),
            }
        }
        ConfigureDataSourceResponse { diagnostics }
    }
}
