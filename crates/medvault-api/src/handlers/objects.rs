use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::download::stream_download;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use medvault_core::AppError;
use medvault_storage::{CanonicalAddress, StorageError};
use std::sync::Arc;

/// Only a missing object is reported as such; everything else is an opaque
/// storage failure, including an unconfigured backend.
fn download_error(err: StorageError) -> HttpAppError {
    if err.is_not_found() {
        HttpAppError(AppError::NotFound(err.to_string()))
    } else {
        HttpAppError(AppError::Storage(err.to_string()))
    }
}

#[utoipa::path(
    get,
    path = "/api/objects/{key}",
    tag = "objects",
    params(
        ("key" = String, Path, description = "Bucket-relative object key, e.g. uploads/<id>")
    ),
    responses(
        (status = 200, description = "Object bytes", content_type = "application/octet-stream"),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, auth),
    fields(
        user_id = %auth.user_id,
        key = %key,
        operation = "download_object"
    )
)]
pub async fn download_object(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let address =
        CanonicalAddress::from_route_tail(&key).map_err(|e| download_error(e.into()))?;

    let storage = state
        .storage
        .as_ref()
        .ok_or_else(|| AppError::Storage("no storage backend configured".to_string()))?;

    let handle = storage
        .resolve_address(address.as_str())
        .await
        .map_err(download_error)?;

    let response = stream_download(storage.as_ref(), &handle, state.download_cache_seconds)
        .await
        .map_err(download_error)?;

    Ok(response)
}
