//! Route configuration and setup

use crate::auth::{auth_middleware, AuthState};
use crate::constants::{HEALTH_PATH, OBJECT_DOWNLOAD_ROUTE, OPENAPI_PATH, UPLOADS_PATH};
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use medvault_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    crate::error::configure_error_details(config);
    let cors = setup_cors(config)?;
    let auth_state = setup_auth_state(config)?;

    let protected_routes = protected_routes().route_layer(axum::middleware::from_fn_with_state(
        Arc::new(auth_state),
        auth_middleware,
    ));

    let app = public_routes()
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|origin| origin == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

fn setup_auth_state(config: &Config) -> Result<AuthState, anyhow::Error> {
    let secret = config
        .jwt_secret()
        .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    Ok(AuthState::new(secret))
}

/// Public routes (no authentication required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(HEALTH_PATH, get(handlers::health::health_check))
        .route(
            OPENAPI_PATH,
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}

/// Protected routes (require a bearer token).
fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(UPLOADS_PATH, post(handlers::uploads::issue_upload_target))
        .route(OBJECT_DOWNLOAD_ROUTE, get(handlers::objects::download_object))
}
