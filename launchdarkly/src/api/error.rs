use thiserror::Error;

use super::common::ApiErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        details: Option<Box<ApiErrorBody>>,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Failed to encode request body: {0}")]
    EncodeError(#[from] serde_json::Error),

    #[error("Invalid API host: {0}")]
    InvalidHost(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Conflicting concurrent update, retries exhausted")]
    Conflict,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Request cancelled")]
    Cancelled,
}

/// How callers should treat a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote object does not exist (HTTP 404)
    Absent,
    /// Worth retrying later; the client already did so and gave up
    Transient,
    Permanent,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::ApiError { status: 404, .. } => ErrorKind::Absent,
            ApiError::RateLimited
            | ApiError::Conflict
            | ApiError::ServiceUnavailable
            | ApiError::Timeout(_) => ErrorKind::Transient,
            ApiError::RequestError(e) if e.is_timeout() || e.is_connect() => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::Absent
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::AuthError => Some(401),
            ApiError::RateLimited => Some(429),
            ApiError::Conflict => Some(409),
            _ => None,
        }
    }
}

pub trait ResultExt<T> {
    /// Maps a 404 to `Ok(None)`; every other error passes through.
    fn absent_as_none(self) -> Result<Option<T>, ApiError>;
}

impl<T> ResultExt<T> for Result<T, ApiError> {
    fn absent_as_none(self) -> Result<Option<T>, ApiError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16) -> ApiError {
        ApiError::ApiError {
            status,
            message: "nope".to_string(),
            details: None,
        }
    }

    #[test]
    fn classification() {
        assert_eq!(status_error(404).kind(), ErrorKind::Absent);
        assert_eq!(status_error(400).kind(), ErrorKind::Permanent);
        assert_eq!(ApiError::RateLimited.kind(), ErrorKind::Transient);
        assert_eq!(ApiError::Conflict.kind(), ErrorKind::Transient);
        assert_eq!(ApiError::AuthError.kind(), ErrorKind::Permanent);
        assert_eq!(ApiError::Cancelled.kind(), ErrorKind::Permanent);
    }

    #[test]
    fn absent_as_none_only_swallows_404() {
        let found: Result<u8, ApiError> = Ok(1);
        assert_eq!(found.absent_as_none().unwrap(), Some(1));

        let missing: Result<u8, ApiError> = Err(status_error(404));
        assert_eq!(missing.absent_as_none().unwrap(), None);

        let broken: Result<u8, ApiError> = Err(status_error(400));
        assert!(broken.absent_as_none().is_err());
    }

    #[test]
    fn display_includes_status() {
        let error = status_error(400);
        assert_eq!(error.to_string(), "API returned error (HTTP 400): nope");
    }
}
