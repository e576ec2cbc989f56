use super::value::ValueType;
use thiserror::Error;

/// Failure translating between configuration and API representations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("invalid {value_type} string {raw:?}")]
    TypeCoercion { raw: String, value_type: ValueType },

    #[error("{0}")]
    Validation(String),

    #[error("{field} {value} is out of range, must be between 0 and {max}")]
    OutOfRange { field: String, value: i64, max: i64 },

    #[error("{0} is not a valid integration_key for audit log subscriptions")]
    UnknownIntegration(String),

    #[error("found unexpected {kind} id format: {id:?} expected format: '{pattern}'")]
    InvalidId {
        kind: String,
        id: String,
        pattern: String,
    },
}

impl ConvertError {
    pub fn validation(message: impl Into<String>) -> Self {
        ConvertError::Validation(message.into())
    }
}
