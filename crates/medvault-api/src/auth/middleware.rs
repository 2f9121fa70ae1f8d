use crate::auth::models::{AuthContext, JwtClaims};
use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use medvault_core::AppError;
use std::sync::Arc;

/// HS256 verifier for bearer tokens.
#[derive(Clone)]
pub struct AuthState {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthState {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate and decode a bearer token.
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AppError> {
        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        AppError::Unauthorized("Token has expired".to_string())
                    }
                    ErrorKind::InvalidSignature => {
                        AppError::Unauthorized("Invalid token signature".to_string())
                    }
                    _ => AppError::Unauthorized(format!("Invalid or expired token: {}", e)),
                }
            })?;

        Ok(token_data.claims)
    }
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match bearer_token(&request).and_then(|token| auth_state.validate_token(token)) {
        Ok(claims) => claims,
        Err(err) => return HttpAppError(err).into_response(),
    };

    tracing::debug!(user_id = %claims.sub, role = %claims.role, "Request authenticated");
    request.extensions_mut().insert(AuthContext::from(claims));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    const SECRET: &str = "unit-test-secret-that-is-long-enough-0001";

    fn token(secret: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            sub: Uuid::new_v4(),
            role: "practitioner".to_string(),
            exp: now + exp_offset,
            iat: now,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode token")
    }

    #[test]
    fn accepts_valid_token() {
        let state = AuthState::new(SECRET);
        let claims = state.validate_token(&token(SECRET, 600)).expect("valid");
        assert_eq!(claims.role, "practitioner");
    }

    #[test]
    fn rejects_expired_token() {
        let state = AuthState::new(SECRET);
        let err = state.validate_token(&token(SECRET, -600)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "Token has expired"));
    }

    #[test]
    fn rejects_foreign_signature() {
        let state = AuthState::new(SECRET);
        let err = state
            .validate_token(&token("another-secret-that-is-also-long-enough", 600))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
