use crate::{
    BackendClients, ObjectStorage, PlatformStorage, S3Storage, StorageBackend, StorageResult,
};
use std::sync::Arc;
use std::time::Duration;

/// Build the storage service for one backend, constructing its client on first use.
pub async fn storage_for(
    backend: StorageBackend,
    clients: &BackendClients,
) -> StorageResult<Arc<dyn ObjectStorage>> {
    match backend {
        StorageBackend::S3 => {
            let client = clients.s3().await?;
            let expiry = Duration::from_secs(clients.settings().upload_url_expiry_secs);
            Ok(Arc::new(S3Storage::new(client, expiry)))
        }
        StorageBackend::Platform => {
            let client = clients.platform().await?;
            Ok(Arc::new(PlatformStorage::new(client)))
        }
    }
}

/// Create the active storage backend selected by `STORAGE_BACKEND`.
pub async fn create_storage(clients: &BackendClients) -> StorageResult<Arc<dyn ObjectStorage>> {
    let backend = clients.settings().backend;
    let storage = storage_for(backend, clients).await?;
    tracing::info!(backend = %backend, bucket = %storage.bucket(), "Active storage backend selected");
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use medvault_core::StorageSettings;

    #[tokio::test]
    async fn selects_configured_backend() {
        let settings = StorageSettings {
            backend: StorageBackend::Platform,
            platform_url: Some("https://proj.example.co".to_string()),
            platform_service_key: Some("service-role-key".to_string()),
            platform_bucket: "clinic-files".to_string(),
            ..StorageSettings::default()
        };
        let storage = create_storage(&BackendClients::new(settings)).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Platform);
        assert_eq!(storage.bucket(), "clinic-files");
    }

    #[tokio::test]
    async fn unconfigured_active_backend_is_reported() {
        let result = create_storage(&BackendClients::new(StorageSettings::default())).await;
        assert!(matches!(
            result,
            Err(StorageError::NotConfigured {
                backend: StorageBackend::S3,
                ..
            })
        ));
    }
}
