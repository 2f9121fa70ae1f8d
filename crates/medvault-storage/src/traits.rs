//! Storage abstraction trait
//!
//! This module defines the [`ObjectStorage`] contract shared by every backend,
//! together with the value types that cross it.

use crate::canonical::{normalize, CanonicalAddress, UnrecognizedFormat};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    UnrecognizedFormat(#[from] UnrecognizedFormat),

    #[error("{backend} storage is not configured (missing {})", .missing.join(", "))]
    NotConfigured {
        backend: StorageBackend,
        missing: Vec<&'static str>,
    },

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Missing objects and unusable addresses both end up as "file not found" for callers.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound(_) | StorageError::UnrecognizedFormat(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// HTTP method the client must use against an upload target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadMethod {
    Put,
    Post,
}

/// A one-shot, time-boxed write capability issued by the backend.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub method: UploadMethod,
    pub url: String,
    /// Address the caller persists once the upload went through.
    pub canonical_address: CanonicalAddress,
    pub expires_in: Duration,
}

/// Where an object physically lives, valid for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHandle {
    pub backend: StorageBackend,
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// An opened object: metadata is known before the body is consumed.
pub struct ObjectDownload {
    pub metadata: ObjectMetadata,
    pub stream: ByteStream,
}

/// Requested access policy for [`ObjectStorage::try_set_visibility`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Public,
}

/// Uniform storage contract
///
/// Both backends implement the same operations so the rest of the application
/// only ever holds an `Arc<dyn ObjectStorage>` and never learns which backend
/// is active.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    fn backend_type(&self) -> StorageBackend;

    fn bucket(&self) -> &str;

    /// Allocate a new key and ask the backend for a write capability on it.
    /// Nothing is uploaded.
    async fn issue_upload_target(&self) -> StorageResult<UploadTarget>;

    /// Resolve a canonical address to a backend handle, or `NotFound`.
    async fn resolve_address(&self, address: &str) -> StorageResult<BackendHandle>;

    /// Start fetching an object. `NotFound` when the backend reports it missing.
    async fn open_download(&self, handle: &BackendHandle) -> StorageResult<ObjectDownload>;

    /// Fetch a whole object into memory.
    async fn download(&self, handle: &BackendHandle) -> StorageResult<(Bytes, ObjectMetadata)> {
        let ObjectDownload {
            metadata,
            mut stream,
        } = self.open_download(handle).await?;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok((buffer.freeze(), metadata))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Write bytes under a caller-chosen key.
    async fn upload_with_key(&self, key: &str, data: Bytes, content_type: &str)
        -> StorageResult<()>;

    /// Best-effort content type lookup outside the download path.
    async fn recover_content_type(&self, _handle: &BackendHandle) -> StorageResult<Option<String>> {
        Ok(None)
    }

    /// Objects are private and reached through capability URLs on every
    /// backend, so this only normalizes the address.
    async fn try_set_visibility(
        &self,
        address: &str,
        _visibility: Visibility,
    ) -> StorageResult<CanonicalAddress> {
        Ok(normalize(address)?)
    }
}

/// Strip the API prefix from a canonical address and pair the key with a bucket.
pub fn handle_from_address(
    backend: StorageBackend,
    bucket: &str,
    address: &str,
) -> StorageResult<BackendHandle> {
    let address =
        CanonicalAddress::parse(address).map_err(|_| StorageError::NotFound(address.to_string()))?;
    Ok(BackendHandle {
        backend,
        bucket: bucket.to_string(),
        key: address.key().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_canonical_address_to_bucket_and_key() {
        let handle =
            handle_from_address(StorageBackend::S3, "patient-files", "/api/objects/uploads/abc-123")
                .unwrap();
        assert_eq!(
            handle,
            BackendHandle {
                backend: StorageBackend::S3,
                bucket: "patient-files".to_string(),
                key: "uploads/abc-123".to_string(),
            }
        );
    }

    #[test]
    fn non_canonical_address_is_not_found() {
        let err = handle_from_address(StorageBackend::S3, "patient-files", "uploads/abc")
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn not_configured_names_missing_variables() {
        let err = StorageError::NotConfigured {
            backend: StorageBackend::Platform,
            missing: vec!["PLATFORM_STORAGE_URL", "PLATFORM_SERVICE_KEY"],
        };
        assert_eq!(
            err.to_string(),
            "platform storage is not configured (missing PLATFORM_STORAGE_URL, PLATFORM_SERVICE_KEY)"
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn upload_method_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&UploadMethod::Put).unwrap(), "\"PUT\"");
        assert_eq!(serde_json::to_string(&UploadMethod::Post).unwrap(), "\"POST\"");
    }
}
