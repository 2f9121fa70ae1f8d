//! Test helpers: build the real router around an in-memory storage backend.
//!
//! Run from workspace root: `cargo test -p medvault-api`.

#![allow(dead_code)]

use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use medvault_api::auth::JwtClaims;
use medvault_api::setup::routes;
use medvault_api::state::AppState;
use medvault_core::{Config, StorageBackend};
use medvault_storage::{InMemoryStorage, ObjectStorage};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-chars";
pub const TEST_BUCKET: &str = "patient-files";
pub const TEST_CACHE_SECONDS: &str = "600";

/// Test application: server plus a handle on the backend it talks to.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Option<Arc<InMemoryStorage>>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn storage(&self) -> &InMemoryStorage {
        self.storage.as_deref().expect("test app has no storage")
    }
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("JWT_SECRET", TEST_JWT_SECRET),
        ("DOWNLOAD_CACHE_SECONDS", TEST_CACHE_SECONDS),
        ("ENVIRONMENT", "development"),
    ]
    .into_iter()
    .collect();
    Config::from_source(&move |name: &str| vars.get(name).map(|v| v.to_string()))
        .expect("test config")
}

fn build_app(storage: Option<Arc<InMemoryStorage>>) -> TestApp {
    let config = test_config();
    let active = storage
        .clone()
        .map(|storage| storage as Arc<dyn ObjectStorage>);
    let state = Arc::new(AppState::new(config.clone(), active));
    let router = routes::setup_routes(&config, state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to start test server");
    TestApp { server, storage }
}

/// App backed by an S3-flavoured in-memory store.
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(StorageBackend::S3)
}

pub fn setup_test_app_with(backend: StorageBackend) -> TestApp {
    build_app(Some(Arc::new(InMemoryStorage::new(backend, TEST_BUCKET))))
}

/// App whose active backend has no credentials.
pub fn setup_unconfigured_app() -> TestApp {
    build_app(None)
}

pub fn token_with(secret: &str, exp_offset_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        sub: Uuid::new_v4(),
        role: "practitioner".to_string(),
        exp: now + exp_offset_secs,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// A valid bearer token for the test secret.
pub fn bearer_token() -> String {
    token_with(TEST_JWT_SECRET, 3600)
}
