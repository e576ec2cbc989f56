//! tfplug - host contract for Terraform providers written in Rust
//!
//! Defines the value model, schemas, and the async traits a provider
//! implements. Transport and plan orchestration belong to the host.

pub mod context;
pub mod error;
pub mod schema;
pub mod types;

pub mod data_source;
pub mod provider;
pub mod resource;

pub mod import;
pub mod validator;

pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::{import_state_passthrough_id, import_state_with_attributes};
pub use provider::{DataSourceFactory, Provider, ProviderResource, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithExists, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, BlockBuilder, NestedBlock, Schema, SchemaBuilder};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
