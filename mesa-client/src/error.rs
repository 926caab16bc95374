//! Client error types

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote store unreachable or refusing requests
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether a retry of the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ClientError::Unavailable(_) | ClientError::Internal(_) => true,
            _ => false,
        }
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        let code = match &err {
            ClientError::NotFound(_) => ErrorCode::NotFound,
            ClientError::Validation(_) => ErrorCode::ValidationFailed,
            ClientError::Serialization(_) | ClientError::InvalidResponse(_) => {
                ErrorCode::SerializationError
            }
            ClientError::Http(_) | ClientError::Unavailable(_) => ErrorCode::RemoteUnavailable,
            _ => ErrorCode::SyncFailed,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_app_error() {
        let err: AppError = ClientError::Unavailable("offline".into()).into();
        assert_eq!(err.code, ErrorCode::RemoteUnavailable);
        assert!(err.is_retryable());

        let err: AppError = ClientError::NotFound("reservations/3".into()).into();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_transient() {
        assert!(ClientError::Unavailable("x".into()).is_transient());
        assert!(!ClientError::Validation("x".into()).is_transient());
        assert!(!ClientError::Unauthorized.is_transient());
    }
}
