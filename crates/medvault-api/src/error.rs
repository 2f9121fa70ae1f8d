//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpAppError>`. Storage and configuration
//! failures convert into [`AppError`] first, so status codes, machine codes and
//! client wording all come from [`ErrorMetadata`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medvault_core::{AppError, Config, ErrorMetadata, LogLevel};
use medvault_storage::StorageError;
use serde::Serialize;
use std::sync::OnceLock;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Sign in again to refresh your session")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    fn from_app_error(app_error: &AppError, with_details: bool) -> Self {
        Self {
            error: app_error.client_message(),
            details: with_details.then(|| app_error.detailed_message()),
            error_type: with_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        }
    }
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: both `IntoResponse` and `AppError` are foreign to this crate).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

/// Set once when the router is built. Unset means details stay hidden.
static EXPOSE_ERROR_DETAILS: OnceLock<bool> = OnceLock::new();

/// Error details are only returned to clients outside production.
pub fn details_allowed(config: &Config) -> bool {
    !config.is_production()
}

pub fn configure_error_details(config: &Config) {
    let allowed = details_allowed(config);
    if EXPOSE_ERROR_DETAILS.set(allowed).is_err() && error_details_exposed() != allowed {
        tracing::warn!("Error detail policy already set for this process; keeping the first one");
    }
}

fn error_details_exposed() -> bool {
    EXPOSE_ERROR_DETAILS.get().copied().unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details only leave the process outside production, and never for sensitive errors.
        let with_details = error_details_exposed() && !app_error.is_sensitive();
        let body = Json(ErrorResponse::from_app_error(app_error, with_details));

        (status, body).into_response()
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(key) => AppError::NotFound(key),
            StorageError::UnrecognizedFormat(unrecognized) => {
                AppError::NotFound(unrecognized.to_string())
            }
            err @ StorageError::NotConfigured { .. } => {
                AppError::StorageNotConfigured(err.to_string())
            }
            other => AppError::Storage(other.to_string()),
        };
        HttpAppError(app)
    }
}
