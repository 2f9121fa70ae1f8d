//! Shared start-up steps for the batch binaries.

use anyhow::{Context, Result};
use medvault_core::Config;
use medvault_db::PgObjectReferenceRepository;
use medvault_storage::{storage_for, BackendClients, ObjectStorage, StorageBackend, StorageError};
use std::sync::Arc;

/// Load configuration and connect to the database. Any failure here is fatal.
pub async fn connect_repository(config: &Config) -> Result<PgObjectReferenceRepository> {
    let database_url = config
        .require_database_url()
        .context("The batch tools need database access")?;
    let pool = medvault_db::connect(database_url, config.db_max_connections()).await?;
    Ok(PgObjectReferenceRepository::new(pool))
}

/// Build a backend's storage service, or `None` when its credentials are absent.
pub async fn open_backend(
    clients: &BackendClients,
    backend: StorageBackend,
) -> Result<Option<Arc<dyn ObjectStorage>>, StorageError> {
    match storage_for(backend, clients).await {
        Ok(storage) => Ok(Some(storage)),
        Err(StorageError::NotConfigured { missing, .. }) => {
            eprintln!(
                "{} storage: not configured (missing {})",
                backend,
                missing.join(", ")
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
