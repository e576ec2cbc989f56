//! Drives a small in-memory provider through the host contract

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_test::assert_ok;

use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderResource, ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ExistsResourceRequest,
    ExistsResourceResponse, ImportResourceStateRequest, ImportResourceStateResponse,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, ResourceWithExists, ResourceWithImportState,
    UpdateResourceRequest, UpdateResourceResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

type Store = Arc<RwLock<HashMap<String, String>>>;

struct NotesProvider {
    store: Store,
}

#[async_trait]
impl Provider for NotesProvider {
    fn type_name(&self) -> &str {
        "notes"
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new().build(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(self.store.clone() as Arc<dyn std::any::Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "notes_note".to_string(),
            Box::new(|| Box::new(NoteResource { store: None }) as Box<dyn ProviderResource>),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "notes_note".to_string(),
            Box::new(|| Box::new(NoteLookup { store: None }) as Box<dyn DataSourceWithConfigure>),
        );
        factories
    }
}

fn note_schema() -> Schema {
    SchemaBuilder::new()
        .attribute(
            AttributeBuilder::new("key", AttributeType::String)
                .required()
                .force_new()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("body", AttributeType::String)
                .optional()
                .build(),
        )
        .build()
}

fn store_from(provider_data: Option<Arc<dyn std::any::Any + Send + Sync>>) -> Result<Store, Diagnostic> {
    provider_data
        .ok_or_else(|| Diagnostic::error("No provider data", "provider data missing"))?
        .downcast::<RwLock<HashMap<String, String>>>()
        .map_err(|_| Diagnostic::error("Invalid provider data", "unexpected type"))
}

struct NoteResource {
    store: Option<Store>,
}

impl NoteResource {
    async fn write(&self, state: &DynamicValue) -> Vec<Diagnostic> {
        let Some(store) = &self.store else {
            return vec![Diagnostic::error("Provider not configured", "")];
        };
        let key = state.get_string(&AttributePath::new("key")).unwrap_or_default();
        let body = state.get_string(&AttributePath::new("body")).unwrap_or_default();
        store.write().await.insert(key, body);
        vec![]
    }
}

#[async_trait]
impl Resource for NoteResource {
    fn type_name(&self) -> &str {
        "notes_note"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: note_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: note_schema().validate_config(&request.config),
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let diagnostics = self.write(&request.planned_state).await;
        CreateResourceResponse {
            new_state: request.planned_state,
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(store) = &self.store else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![Diagnostic::error("Provider not configured", "")],
            };
        };
        let key = request
            .current_state
            .get_string(&AttributePath::new("key"))
            .unwrap_or_default();
        let new_state = store.read().await.get(&key).map(|body| {
            DynamicValue::new(Dynamic::object([
                ("id", Dynamic::from(key.as_str())),
                ("key", Dynamic::from(key.as_str())),
                ("body", Dynamic::from(body.as_str())),
            ]))
        });
        ReadResourceResponse {
            new_state,
            diagnostics: vec![],
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let diagnostics = self.write(&request.planned_state).await;
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        if let Some(store) = &self.store {
            if let Ok(key) = request.prior_state.get_string(&AttributePath::new("key")) {
                store.write().await.remove(&key);
            }
        }
        DeleteResourceResponse { diagnostics: vec![] }
    }
}

#[async_trait]
impl ResourceWithConfigure for NoteResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        match store_from(request.provider_data) {
            Ok(store) => {
                self.store = Some(store);
                ConfigureResourceResponse { diagnostics: vec![] }
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

#[async_trait]
impl ResourceWithImportState for NoteResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("key"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithExists for NoteResource {
    async fn exists(&self, ctx: Context, request: ExistsResourceRequest) -> ExistsResourceResponse {
        let read = self
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: request.type_name,
                    current_state: request.current_state,
                },
            )
            .await;
        ExistsResourceResponse {
            exists: read.new_state.is_some(),
            diagnostics: read.diagnostics,
        }
    }
}

struct NoteLookup {
    store: Option<Store>,
}

#[async_trait]
impl DataSource for NoteLookup {
    fn type_name(&self) -> &str {
        "notes_note"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: note_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse { diagnostics: vec![] }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let key = request.config.get_string(&AttributePath::new("key")).unwrap_or_default();
        let body = match &self.store {
            Some(store) => store.read().await.get(&key).cloned(),
            None => None,
        };
        match body {
            Some(body) => {
                let mut state = request.config.clone();
                state.set_string(&AttributePath::new("body"), body).unwrap();
                ReadDataSourceResponse {
                    state,
                    diagnostics: vec![],
                }
            }
            None => ReadDataSourceResponse {
                state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error("Note not found", key)],
            },
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for NoteLookup {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        match store_from(request.provider_data) {
            Ok(store) => {
                self.store = Some(store);
                ConfigureDataSourceResponse { diagnostics: vec![] }
            }
            Err(diag) => ConfigureDataSourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

async fn configured_note(provider: &mut NotesProvider) -> Box<dyn ProviderResource> {
    let ctx = Context::new();
    let configured = provider
        .configure(
            ctx.clone(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::empty_object(),
            },
        )
        .await;
    let factories = provider.resources();
    let mut resource = (factories["notes_note"])();
    let response = resource
        .configure(
            ctx,
            ConfigureResourceRequest {
                provider_data: configured.provider_data,
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
    resource
}

fn note(key: &str, body: &str) -> DynamicValue {
    DynamicValue::new(Dynamic::object([
        ("key", Dynamic::from(key)),
        ("body", Dynamic::from(body)),
    ]))
}

#[tokio::test]
async fn resource_lifecycle_through_factory() {
    let mut provider = NotesProvider {
        store: Arc::new(RwLock::new(HashMap::new())),
    };
    let resource = configured_note(&mut provider).await;
    let ctx = Context::new();

    let created = resource
        .create(
            ctx.clone(),
            CreateResourceRequest {
                type_name: "notes_note".to_string(),
                planned_state: note("a", "hello"),
                config: note("a", "hello"),
            },
        )
        .await;
    assert!(created.diagnostics.is_empty());

    let exists = resource
        .exists(
            ctx.clone(),
            ExistsResourceRequest {
                type_name: "notes_note".to_string(),
                current_state: created.new_state.clone(),
            },
        )
        .await;
    assert!(exists.exists);

    resource
        .delete(
            ctx.clone(),
            DeleteResourceRequest {
                type_name: "notes_note".to_string(),
                prior_state: created.new_state.clone(),
            },
        )
        .await;

    let read = resource
        .read(
            ctx,
            ReadResourceRequest {
                type_name: "notes_note".to_string(),
                current_state: created.new_state,
            },
        )
        .await;
    assert!(read.new_state.is_none());
    assert!(read.diagnostics.is_empty());
}

#[tokio::test]
async fn import_then_read_refreshes_state() {
    let store: Store = Arc::new(RwLock::new(HashMap::from([(
        "imported".to_string(),
        "body".to_string(),
    )])));
    let mut provider = NotesProvider { store };
    let resource = configured_note(&mut provider).await;
    let ctx = Context::new();

    let imported = resource
        .import_state(
            ctx.clone(),
            ImportResourceStateRequest {
                type_name: "notes_note".to_string(),
                id: "imported".to_string(),
            },
        )
        .await;
    let seeded = imported.imported_resources.into_iter().next().unwrap().state;

    let read = resource
        .read(
            ctx,
            ReadResourceRequest {
                type_name: "notes_note".to_string(),
                current_state: seeded,
            },
        )
        .await;
    let state = read.new_state.unwrap();
    assert_eq!(assert_ok!(state.get_string(&AttributePath::new("body"))), "body");
}

#[tokio::test]
async fn unconfigured_resource_reports_diagnostic() {
    let mut resource = NoteResource { store: None };
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(Arc::new(42u32)),
            },
        )
        .await;
    assert_eq!(response.diagnostics[0].summary, "Invalid provider data");

    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "notes_note".to_string(),
                planned_state: note("a", "b"),
                config: note("a", "b"),
            },
        )
        .await;
    assert_eq!(created.diagnostics[0].summary, "Provider not configured");
}

#[tokio::test]
async fn validate_uses_schema() {
    let resource = NoteResource { store: None };
    let response = resource
        .validate(
            Context::new(),
            ValidateResourceConfigRequest {
                type_name: "notes_note".to_string(),
                config: DynamicValue::new(Dynamic::object([("body", Dynamic::from("x"))])),
            },
        )
        .await;
    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].attribute, Some(AttributePath::new("key")));
}

#[tokio::test]
async fn data_source_reads_from_provider_data() {
    let store: Store = Arc::new(RwLock::new(HashMap::from([(
        "k".to_string(),
        "v".to_string(),
    )])));
    let mut provider = NotesProvider { store };
    let ctx = Context::new();
    let configured = provider
        .configure(
            ctx.clone(),
            ConfigureProviderRequest {
                terraform_version: "1.9.0".to_string(),
                config: DynamicValue::empty_object(),
            },
        )
        .await;
    let mut lookup = (provider.data_sources()["notes_note"])();
    lookup
        .configure(
            ctx.clone(),
            ConfigureDataSourceRequest {
                provider_data: configured.provider_data,
            },
        )
        .await;

    let found = lookup
        .read(
            ctx.clone(),
            ReadDataSourceRequest {
                type_name: "notes_note".to_string(),
                config: DynamicValue::new(Dynamic::object([("key", Dynamic::from("k"))])),
            },
        )
        .await;
    assert_eq!(found.state.get_string(&AttributePath::new("body")).unwrap(), "v");

    let missing = lookup
        .read(
            ctx,
            ReadDataSourceRequest {
                type_name: "notes_note".to_string(),
                config: DynamicValue::new(Dynamic::object([("key", Dynamic::from("nope"))])),
            },
        )
        .await;
    assert!(tfplug::types::has_errors(&missing.diagnostics));
}

#[tokio::test]
async fn concurrent_creates_share_provider_data() {
    let store: Store = Arc::new(RwLock::new(HashMap::new()));
    let mut provider = NotesProvider { store: store.clone() };
    let resource: Arc<dyn ProviderResource> = Arc::from(configured_note(&mut provider).await);

    let mut handles = vec![];
    for i in 0..10 {
        let resource = resource.clone();
        handles.push(tokio::spawn(async move {
            let ctx = Context::new().with_timeout(Duration::from_secs(5));
            resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: "notes_note".to_string(),
                        planned_state: note(&format!("n{}", i), "x"),
                        config: note(&format!("n{}", i), "x"),
                    },
                )
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().diagnostics.is_empty());
    }

    assert_eq!(store.read().await.len(), 10);
}
