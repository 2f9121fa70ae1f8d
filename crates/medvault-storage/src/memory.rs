//! In-memory storage backend for tests.
//!
//! Behaves like either backend (chosen at construction) and can be told to
//! fail uploads, downloads or existence probes.

use crate::keys::allocate_upload_key;
use crate::traits::{
    handle_from_address, BackendHandle, ObjectDownload, ObjectMetadata, ObjectStorage,
    StorageError, StorageResult, UploadMethod, UploadTarget,
};
use crate::{CanonicalAddress, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use medvault_core::constants::DEFAULT_UPLOAD_URL_EXPIRY_SECS;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

pub struct InMemoryStorage {
    backend: StorageBackend,
    bucket: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    listing_content_types: Mutex<HashMap<String, String>>,
    fail_uploads: AtomicBool,
    fail_downloads: AtomicBool,
    fail_probes: AtomicBool,
}

impl InMemoryStorage {
    pub fn new(backend: StorageBackend, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
            listing_content_types: Mutex::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
            fail_downloads: AtomicBool::new(false),
            fail_probes: AtomicBool::new(false),
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object directly, bypassing failure injection.
    pub fn insert(&self, key: &str, data: impl Into<Bytes>, content_type: Option<&str>) {
        self.objects().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.objects().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects().contains_key(key)
    }

    /// Stored bytes and content type of an object.
    pub fn object(&self, key: &str) -> Option<(Bytes, Option<String>)> {
        self.objects()
            .get(key)
            .map(|object| (object.data.clone(), object.content_type.clone()))
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Content type reported by [`ObjectStorage::recover_content_type`] for `key`.
    pub fn set_listing_content_type(&self, key: &str, content_type: &str) {
        self.listing_content_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), content_type.to_string());
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_probes(&self, fail: bool) {
        self.fail_probes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    fn backend_type(&self) -> StorageBackend {
        self.backend
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn issue_upload_target(&self) -> StorageResult<UploadTarget> {
        let key = allocate_upload_key();
        Ok(UploadTarget {
            method: UploadMethod::Put,
            url: format!("memory://{}/{}", self.bucket, key),
            canonical_address: CanonicalAddress::from_key(&key)?,
            expires_in: Duration::from_secs(DEFAULT_UPLOAD_URL_EXPIRY_SECS),
        })
    }

    async fn resolve_address(&self, address: &str) -> StorageResult<BackendHandle> {
        let handle = handle_from_address(self.backend, &self.bucket, address)?;
        // The platform confirms existence at resolve time; mirror that.
        if self.backend == StorageBackend::Platform && !self.contains(&handle.key) {
            return Err(StorageError::NotFound(handle.key));
        }
        Ok(handle)
    }

    async fn open_download(&self, handle: &BackendHandle) -> StorageResult<ObjectDownload> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(StorageError::DownloadFailed(format!(
                "injected download failure for {}",
                handle.key
            )));
        }
        let object = self
            .objects()
            .get(&handle.key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(handle.key.clone()))?;

        let metadata = ObjectMetadata {
            content_type: object.content_type,
            content_length: Some(object.data.len() as u64),
        };
        let stream = futures::stream::iter(vec![Ok::<_, StorageError>(object.data)]);
        Ok(ObjectDownload {
            metadata,
            stream: Box::pin(stream),
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        if self.fail_probes.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError(format!(
                "injected probe failure for {}",
                key
            )));
        }
        Ok(self.contains(key))
    }

    async fn upload_with_key(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!(
                "injected upload failure for {}",
                key
            )));
        }
        self.insert(key, data, Some(content_type));
        Ok(())
    }

    async fn recover_content_type(&self, handle: &BackendHandle) -> StorageResult<Option<String>> {
        Ok(self
            .listing_content_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.key)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Visibility;

    #[tokio::test]
    async fn stores_and_streams_objects() {
        let storage = InMemoryStorage::new(StorageBackend::S3, "patient-files");
        storage.insert("uploads/a", Bytes::from_static(b"hello"), Some("text/plain"));

        let handle = storage.resolve_address("/api/objects/uploads/a").await.unwrap();
        let (bytes, metadata) = storage.download(&handle).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
        assert_eq!(metadata.content_type.as_deref(), Some("text/plain"));
        assert_eq!(metadata.content_length, Some(5));
    }

    #[tokio::test]
    async fn platform_flavour_checks_existence_on_resolve() {
        let storage = InMemoryStorage::new(StorageBackend::Platform, "patient-files");
        let err = storage
            .resolve_address("/api/objects/uploads/none")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let storage = InMemoryStorage::new(StorageBackend::S3, "patient-files");
        storage.fail_uploads(true);
        assert!(storage
            .upload_with_key("uploads/x", Bytes::from_static(b"x"), "text/plain")
            .await
            .is_err());
        assert!(!storage.contains("uploads/x"));
    }

    #[tokio::test]
    async fn visibility_is_a_normalizing_no_op() {
        let storage = InMemoryStorage::new(StorageBackend::S3, "patient-files");
        let address = storage
            .try_set_visibility("uploads/abc", Visibility::Public)
            .await
            .unwrap();
        assert_eq!(address.as_str(), "/api/objects/uploads/abc");
    }
}
