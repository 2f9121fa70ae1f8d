use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use medvault_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims issued by the session system.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid, // user_id
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, stored in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: String,
}

impl From<JwtClaims> for AuthContext {
    fn from(claims: JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
        }
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing authentication context".to_string(),
                ))
            })
    }
}
