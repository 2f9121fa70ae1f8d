//! Streams a resolved object into an HTTP response.

use crate::constants::cache_control_value;
use axum::{
    body::Body,
    http::{header, Response, StatusCode},
};
use futures::StreamExt;
use medvault_core::constants::DEFAULT_CONTENT_TYPE;
use medvault_storage::{BackendHandle, ObjectStorage, StorageError};
use std::time::Instant;

/// Open `handle` on `storage` and build a streaming response with content
/// headers taken from backend metadata.
///
/// Nothing is written before the backend has answered, so a missing object
/// still becomes a 404 rather than a truncated 200.
pub async fn stream_download(
    storage: &dyn ObjectStorage,
    handle: &BackendHandle,
    cache_seconds: u64,
) -> Result<Response<Body>, StorageError> {
    let start = Instant::now();
    let download = storage.open_download(handle).await?;

    let content_type = download
        .metadata
        .content_type
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    tracing::debug!(
        bucket = %handle.bucket,
        key = %handle.key,
        content_type = %content_type,
        size_bytes = ?download.metadata.content_length,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Proxying object from storage"
    );

    let key = handle.key.clone();
    let body_stream = download.stream.map(move |result| {
        result.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Storage stream interrupted");
            std::io::Error::other("storage stream error")
        })
    });

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, cache_control_value(cache_seconds));
    if let Some(length) = download.metadata.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(body_stream))
        .map_err(|e| StorageError::DownloadFailed(format!("Failed to build response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use medvault_storage::{InMemoryStorage, StorageBackend};

    #[tokio::test]
    async fn sets_content_headers_from_metadata() {
        let storage = InMemoryStorage::new(StorageBackend::S3, "patient-files");
        storage.insert("uploads/xray", b"DICM".to_vec(), Some("application/dicom"));
        let handle = storage
            .resolve_address("/api/objects/uploads/xray")
            .await
            .expect("resolve");

        let response = stream_download(&storage, &handle, 120).await.expect("download");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/dicom");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "private, max-age=120");

        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&body[..], b"DICM");
    }

    #[tokio::test]
    async fn falls_back_to_octet_stream() {
        let storage = InMemoryStorage::new(StorageBackend::S3, "patient-files");
        storage.insert("uploads/blob", b"x".to_vec(), None);
        let handle = storage
            .resolve_address("/api/objects/uploads/blob")
            .await
            .expect("resolve");

        let response = stream_download(&storage, &handle, 60).await.expect("download");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let storage = InMemoryStorage::new(StorageBackend::S3, "patient-files");
        let handle = storage
            .resolve_address("/api/objects/uploads/gone")
            .await
            .expect("resolve");

        let err = stream_download(&storage, &handle, 60).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
