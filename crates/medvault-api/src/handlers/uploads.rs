use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// A one-shot write capability plus the address to persist once the upload succeeded.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadTargetResponse {
    /// `PUT` or `POST`
    pub method: String,
    pub url: String,
    /// Canonical address, e.g. `/api/objects/uploads/<id>`
    pub canonical_address: String,
    pub expires_in_seconds: u64,
}

#[utoipa::path(
    post,
    path = "/api/uploads",
    tag = "uploads",
    responses(
        (status = 200, description = "Upload target issued", body = UploadTargetResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 503, description = "File storage is not configured", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, auth),
    fields(user_id = %auth.user_id, operation = "issue_upload_target")
)]
pub async fn issue_upload_target(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
) -> Result<Json<UploadTargetResponse>, HttpAppError> {
    let storage = state.storage()?;
    let target = storage.issue_upload_target().await?;

    tracing::info!(
        backend = %storage.backend_type(),
        canonical_address = %target.canonical_address,
        "Upload target issued"
    );

    let method = match target.method {
        medvault_storage::UploadMethod::Put => "PUT",
        medvault_storage::UploadMethod::Post => "POST",
    };

    Ok(Json(UploadTargetResponse {
        method: method.to_string(),
        url: target.url,
        canonical_address: target.canonical_address.into_string(),
        expires_in_seconds: target.expires_in.as_secs(),
    }))
}
