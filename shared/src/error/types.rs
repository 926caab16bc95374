//! Application error type

use super::codes::ErrorCode;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// This is the error shape surfaced to the view layer:
/// - Standardized error codes via [`ErrorCode`]
/// - Human-readable messages
/// - Optional structured details (entity kind, id, operation)
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Whether the failure is transient and the operation may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::SyncFailed | ErrorCode::RemoteUnavailable | ErrorCode::InvoiceAssignmentFailed
        )
    }

    // ==================== Convenience constructors ====================

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        let r = resource.into();
        Self::with_message(ErrorCode::NotFound, format!("{} not found", r))
            .with_detail("resource", r)
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// Create a sync error
    pub fn sync(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::SyncFailed, msg)
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_message() {
        let err = AppError::new(ErrorCode::TableBusy);
        assert_eq!(err.message, ErrorCode::TableBusy.message());
        assert!(err.details.is_none());
    }

    #[test]
    fn test_with_detail() {
        let err = AppError::validation("people must be positive")
            .with_detail("field", "people")
            .with_detail("value", 0);
        let details = err.details.unwrap();
        assert_eq!(details.get("field"), Some(&Value::from("people")));
        assert_eq!(details.get("value"), Some(&Value::from(0)));
    }

    #[test]
    fn test_not_found_detail() {
        let err = AppError::not_found("Reservation r-1");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.to_string(), "Reservation r-1 not found");
    }

    #[test]
    fn test_retryable() {
        assert!(AppError::sync("timeout").is_retryable());
        assert!(!AppError::validation("bad").is_retryable());
    }
}
