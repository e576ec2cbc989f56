//! Generic adapter between the host's resource traits and per-type
//! orchestrators.
//!
//! An [`Orchestrator`] only knows how to talk to the API for one resource
//! type. [`ManagedResource`] supplies the rest: provider data, diagnostics,
//! absent handling, import and existence probes.

use super::error::{ApiContext, ResourceError};
use crate::api::Client;
use crate::convert::{Attrs, ConvertError};
use crate::provider_data::{LaunchDarklyProviderData, Session};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_with_attributes;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ExistsResourceRequest,
    ExistsResourceResponse, ImportResourceStateRequest, ImportResourceStateResponse,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceSchemaRequest,
    ResourceSchemaResponse, ResourceWithConfigure, ResourceWithExists, ResourceWithImportState,
    UpdateResourceRequest, UpdateResourceResponse, ValidateResourceConfigRequest,
    ValidateResourceConfigResponse,
};
use tfplug::schema::Schema;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tracing::{debug, warn};

#[async_trait]
pub trait Orchestrator: Default + Send + Sync + 'static {
    /// Terraform type name, e.g. `launchdarkly_project`.
    const TYPE_NAME: &'static str;
    /// Human name used in messages, e.g. `project`.
    const NOUN: &'static str;

    fn schema() -> Schema;

    /// Checks that need more than the schema. Runs before any network call.
    fn validate(_config: &DynamicValue) -> Result<(), ConvertError> {
        Ok(())
    }

    /// Attributes seeded into state from an import ID.
    fn import(id: &str) -> Result<Vec<(AttributePath, String)>, ConvertError>;

    async fn create(&self, session: &Session, config: &DynamicValue) -> Result<DynamicValue, ResourceError>;

    /// `Ok(None)` when the object no longer exists.
    async fn read(&self, session: &Session, state: &DynamicValue) -> Result<Option<DynamicValue>, ResourceError>;

    async fn update(
        &self,
        session: &Session,
        prior: &DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, ResourceError>;

    async fn delete(&self, session: &Session, prior: &DynamicValue) -> Result<(), ResourceError>;
}

/// Reads back after a write. A write the API accepted but cannot return
/// is an error, not an absent object.
pub async fn read_back<O: Orchestrator>(
    orchestrator: &O,
    session: &Session,
    state: &DynamicValue,
    operation: &'static str,
    id: &str,
) -> Result<DynamicValue, ResourceError> {
    orchestrator
        .read(session, state)
        .await?
        .ok_or_else(|| ResourceError::Vanished {
            operation,
            resource: O::NOUN,
            id: id.to_string(),
        })
}

/// `config` with `id` filled in; the starting point for reading back a
/// freshly created object.
pub fn seeded(config: &DynamicValue, id: &str) -> DynamicValue {
    let mut state = config.clone();
    if let Dynamic::Map(fields) = &mut state.value {
        fields.insert("id".to_string(), Dynamic::from(id));
    }
    state
}

/// Adds `fields` to an object, overwriting existing entries.
pub fn extend_object<I>(value: Dynamic, fields: I) -> Dynamic
where
    I: IntoIterator<Item = (&'static str, Dynamic)>,
{
    match value {
        Dynamic::Map(mut map) => {
            map.extend(fields.into_iter().map(|(k, v)| (k.to_string(), v)));
            Dynamic::Map(map)
        }
        _ => Dynamic::object(fields),
    }
}

/// Reads a string attribute, falling back to the `id` seeded by import.
pub fn key_or_id(attrs: Attrs<'_>, name: &str) -> String {
    attrs
        .non_empty(name)
        .or_else(|| attrs.non_empty("id"))
        .unwrap_or_default()
}

pub async fn require_project(client: &Client, project_key: &str) -> Result<(), ResourceError> {
    match client
        .projects()
        .get(project_key)
        .await
        .absent_during("read", "project", project_key)?
    {
        Some(_) => Ok(()),
        None => Err(ResourceError::MissingParent(format!(
            "cannot find project with key {:?}",
            project_key
        ))),
    }
}

pub async fn require_environment(
    client: &Client,
    project_key: &str,
    env_key: &str,
) -> Result<(), ResourceError> {
    require_project(client, project_key).await?;
    match client
        .environments()
        .get(project_key, env_key)
        .await
        .absent_during("read", "environment", env_key)?
    {
        Some(_) => Ok(()),
        None => Err(ResourceError::MissingParent(format!(
            "failed to find environment with key {:?} in project {:?}",
            env_key, project_key
        ))),
    }
}

pub struct ManagedResource<O: Orchestrator> {
    orchestrator: O,
    provider_data: Option<LaunchDarklyProviderData>,
}

impl<O: Orchestrator> Default for ManagedResource<O> {
    fn default() -> Self {
        Self {
            orchestrator: O::default(),
            provider_data: None,
        }
    }
}

impl<O: Orchestrator> ManagedResource<O> {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self, ctx: &Context) -> Result<Session, Diagnostic> {
        self.provider_data
            .as_ref()
            .map(|data| data.session(ctx))
            .ok_or_else(|| {
                Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                )
            })
    }

    fn failure(operation: &str, err: &ResourceError) -> Diagnostic {
        Diagnostic::error(
            format!("Failed to {} {}", operation, O::NOUN),
            err.to_string(),
        )
    }
}

#[async_trait]
impl<O: Orchestrator> Resource for ManagedResource<O> {
    fn type_name(&self) -> &str {
        O::TYPE_NAME
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: O::schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = O::schema().validate_config(&request.config);
        if let Err(e) = O::validate(&request.config) {
            diagnostics.push(Diagnostic::error("Invalid configuration", e.to_string()));
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let session = match self.session(&ctx) {
            Ok(s) => s,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics: vec![diag],
                }
            }
        };
        if let Err(e) = O::validate(&request.config) {
            return CreateResourceResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error("Invalid configuration", e.to_string())],
            };
        }

        debug!(resource = O::TYPE_NAME, "creating");
        match self.orchestrator.create(&session, &request.config).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => CreateResourceResponse {
                new_state: DynamicValue::null(),
                diagnostics: vec![Self::failure("create", &e)],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let session = match self.session(&ctx) {
            Ok(s) => s,
            Err(diag) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![diag],
                }
            }
        };

        match self.orchestrator.read(&session, &request.current_state).await {
            Ok(Some(state)) => ReadResourceResponse {
                new_state: Some(state),
                diagnostics: vec![],
            },
            Ok(None) => {
                let id = request
                    .current_state
                    .get_string(&AttributePath::new("id"))
                    .unwrap_or_default();
                warn!(resource = O::TYPE_NAME, id = %id, "not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![Diagnostic::warning(
                        format!("{} not found", O::NOUN),
                        format!("{} {:?} no longer exists and was removed from state", O::NOUN, id),
                    )],
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![Self::failure("read", &e)],
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let session = match self.session(&ctx) {
            Ok(s) => s,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics: vec![diag],
                }
            }
        };
        if let Err(e) = O::validate(&request.config) {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Diagnostic::error("Invalid configuration", e.to_string())],
            };
        }

        debug!(resource = O::TYPE_NAME, "updating");
        match self
            .orchestrator
            .update(&session, &request.prior_state, &request.config)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![Self::failure("update", &e)],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let session = match self.session(&ctx) {
            Ok(s) => s,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        debug!(resource = O::TYPE_NAME, "deleting");
        let diagnostics = match self.orchestrator.delete(&session, &request.prior_state).await {
            Ok(()) => vec![],
            // Already gone is what delete wanted.
            Err(e) if e.is_not_found() => vec![],
            Err(e) => vec![Self::failure("delete", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl<O: Orchestrator> ResourceWithConfigure for ManagedResource<O> {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
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
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl<O: Orchestrator> ResourceWithImportState for ManagedResource<O> {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        match O::import(&request.id) {
            Ok(attributes) => import_state_with_attributes(&ctx, attributes, &request, &mut response),
            Err(e) => response
                .diagnostics
                .push(Diagnostic::error("Invalid import ID", e.to_string())),
        }
        response
    }
}

#[async_trait]
impl<O: Orchestrator> ResourceWithExists for ManagedResource<O> {
    async fn exists(&self, ctx: Context, request: ExistsResourceRequest) -> ExistsResourceResponse {
        let session = match self.session(&ctx) {
            Ok(s) => s,
            Err(diag) => {
                return ExistsResourceResponse {
                    exists: false,
                    diagnostics: vec![diag],
                }
            }
        };
        match self.orchestrator.read(&session, &request.current_state).await {
            Ok(found) => ExistsResourceResponse {
                exists: found.is_some(),
                diagnostics: vec![],
            },
            Err(e) if e.is_not_found() => ExistsResourceResponse {
                exists: false,
                diagnostics: vec![],
            },
            Err(e) => ExistsResourceResponse {
                exists: false,
                diagnostics: vec![Self::failure("read", &e)],
            },
        }
    }
}
