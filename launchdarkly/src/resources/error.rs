use crate::api::{ApiError, ResultExt};
use crate::convert::ConvertError;
use std::future::Future;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("failed to {operation} {resource} {id:?}: {source}")]
    Api {
        operation: &'static str,
        resource: &'static str,
        id: String,
        #[source]
        source: ApiError,
    },

    /// A parent object the resource lives under does not exist.
    #[error("{0}")]
    MissingParent(String),

    #[error("{resource} {id:?} was not found after {operation}")]
    Vanished {
        operation: &'static str,
        resource: &'static str,
        id: String,
    },

    #[error("{cause}; deleting the partially created {resource} {id:?} also failed: {rollback}")]
    RollbackFailed {
        resource: &'static str,
        id: String,
        cause: Box<ResourceError>,
        rollback: ApiError,
    },
}

impl ResourceError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ResourceError::Api { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_not_found)
    }
}

/// Attaches the operation and resource identity to API failures.
pub trait ApiContext<T> {
    fn during(self, operation: &'static str, resource: &'static str, id: &str) -> Result<T, ResourceError>;

    /// Like [`ApiContext::during`], but a 404 becomes `Ok(None)`.
    fn absent_during(
        self,
        operation: &'static str,
        resource: &'static str,
        id: &str,
    ) -> Result<Option<T>, ResourceError>;
}

impl<T> ApiContext<T> for Result<T, ApiError> {
    fn during(self, operation: &'static str, resource: &'static str, id: &str) -> Result<T, ResourceError> {
        self.map_err(|source| ResourceError::Api {
            operation,
            resource,
            id: id.to_string(),
            source,
        })
    }

    fn absent_during(
        self,
        operation: &'static str,
        resource: &'static str,
        id: &str,
    ) -> Result<Option<T>, ResourceError> {
        self.absent_as_none().during(operation, resource, id)
    }
}

/// Runs `rollback` when the follow-up step after a create failed, so a
/// half-configured object is not left behind.
pub async fn rollback_on_error<T, F>(
    result: Result<T, ResourceError>,
    resource: &'static str,
    id: &str,
    rollback: F,
) -> Result<T, ResourceError>
where
    F: Future<Output = Result<(), ApiError>>,
{
    let cause = match result {
        Ok(value) => return Ok(value),
        Err(cause) => cause,
    };
    warn!(resource, id, error = %cause, "follow-up after create failed, deleting created object");
    match rollback.await {
        Ok(()) => Err(cause),
        Err(rollback) => Err(ResourceError::RollbackFailed {
            resource,
            id: id.to_string(),
            cause: Box::new(cause),
            rollback,
        }),
    }
}
