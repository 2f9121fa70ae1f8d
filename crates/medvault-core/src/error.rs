//! Error types module
//!
//! All gateway errors surfaced to HTTP callers are unified under [`AppError`].
//! Each variant describes its own response through [`ErrorMetadata`], so the API
//! layer never decides status codes or client wording by itself.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like a missing object or a bad token
    Debug,
    /// Misconfiguration an operator has to fix
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses: how an error should be presented to a client.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "STORAGE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage not configured: {0}")]
    StorageNotConfigured(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl AppError {
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::StorageNotConfigured(_) => "StorageNotConfigured",
            AppError::NotFound(_) => "NotFound",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Error message followed by its source chain, for logs and non-production responses.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();
        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }
        details
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::StorageNotConfigured(_) => (
            503,
            "STORAGE_NOT_CONFIGURED",
            false,
            Some("Contact an administrator to configure file storage"),
            true,
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file address exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Sign in again to refresh your session"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::StorageNotConfigured(_) => {
                "File storage is not configured on this server".to_string()
            }
            AppError::NotFound(_) => "File not found".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Unauthorized(_) => "Authentication required".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_storage_not_configured() {
        let err = AppError::StorageNotConfigured("S3_ENDPOINT".to_string());
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "STORAGE_NOT_CONFIGURED");
        assert!(!err.is_recoverable());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("S3_ENDPOINT"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_not_found_is_generic() {
        let err = AppError::NotFound("uploads/abc-123 missing in bucket".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(err.client_message(), "File not found");
        assert!(!err.is_sensitive());
    }

    #[test]
    fn test_not_configured_and_unauthorized_never_collapse() {
        let not_configured = AppError::StorageNotConfigured("platform".to_string());
        let unauthorized = AppError::Unauthorized("missing token".to_string());
        assert_ne!(not_configured.http_status_code(), unauthorized.http_status_code());
        assert_ne!(not_configured.client_message(), unauthorized.client_message());
        assert_ne!(
            not_configured.suggested_action(),
            unauthorized.suggested_action()
        );
    }

    #[test]
    fn test_error_metadata_storage_hides_details() {
        let err = AppError::Storage("SignatureDoesNotMatch for key uploads/x".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.client_message(), "Failed to access storage");
        assert!(err.is_sensitive());
    }

    #[test]
    fn test_anyhow_conversion_keeps_message() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert!(matches!(err, AppError::InternalWithSource { ref message, .. } if message == "boom"));
    }
}
