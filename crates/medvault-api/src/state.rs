//! Shared application state

use medvault_core::{AppError, Config};
use medvault_storage::ObjectStorage;
use std::sync::Arc;

/// State shared by every request handler.
///
/// The active storage backend is chosen once at startup. It is `None` when the
/// selected backend has no credentials; the server still starts and answers
/// storage routes with a "not configured" error.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub download_cache_seconds: u64,
}

impl AppState {
    pub fn new(config: Config, storage: Option<Arc<dyn ObjectStorage>>) -> Self {
        let download_cache_seconds = config.download_cache_seconds();
        Self {
            config,
            storage,
            download_cache_seconds,
        }
    }

    /// The active storage backend, or `StorageNotConfigured`.
    pub fn storage(&self) -> Result<&Arc<dyn ObjectStorage>, AppError> {
        self.storage.as_ref().ok_or_else(|| {
            AppError::StorageNotConfigured(format!(
                "{} storage backend has no credentials",
                self.config.storage_backend()
            ))
        })
    }

    /// Label reported by the health route.
    pub fn storage_label(&self) -> String {
        self.storage
            .as_ref()
            .map(|storage| storage.backend_type().to_string())
            .unwrap_or_else(|| "unconfigured".to_string())
    }
}
