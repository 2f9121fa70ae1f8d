use medvault_core::Config;
use medvault_storage::{create_storage, BackendClients, ObjectStorage, StorageError};
use std::sync::Arc;

/// Build the active storage backend.
///
/// Missing credentials are not fatal: the server starts without storage and the
/// storage routes report that it is not configured.
pub async fn setup_storage(config: &Config) -> Option<Arc<dyn ObjectStorage>> {
    let clients = BackendClients::new(config.storage().clone());
    match create_storage(&clients).await {
        Ok(storage) => Some(storage),
        Err(err @ StorageError::NotConfigured { .. }) => {
            tracing::warn!(error = %err, "Storage backend not configured; storage routes disabled");
            None
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to initialize storage backend");
            None
        }
    }
}
