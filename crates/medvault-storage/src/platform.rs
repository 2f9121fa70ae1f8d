//! Managed storage platform backend.
//!
//! The platform exposes a REST surface under `<project-url>/storage/v1/object`.
//! It has no cheap stat call, so existence checks go through a filtered listing
//! of the object's parent folder.

use crate::clients::PlatformCredentials;
use crate::keys::allocate_upload_key;
use crate::traits::{
    handle_from_address, BackendHandle, ObjectDownload, ObjectMetadata, ObjectStorage,
    StorageError, StorageResult, UploadMethod, UploadTarget,
};
use crate::{CanonicalAddress, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use medvault_core::constants::PLATFORM_SIGNED_UPLOAD_EXPIRY_SECS;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const LIST_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct SignedUploadResponse {
    #[serde(alias = "signedURL", alias = "signedUrl")]
    url: String,
}

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    search: &'a str,
    limit: u32,
    offset: u32,
}

/// One entry of a folder listing. Sub-folders come back without id or metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformObject {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<PlatformObjectMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformObjectMetadata {
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// HTTP client for the platform's storage API.
#[derive(Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl PlatformClient {
    pub fn new(credentials: &PlatformCredentials, timeout: Duration) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: credentials.url.trim_end_matches('/').to_string(),
            service_key: credentials.service_key.clone(),
            bucket: credentials.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, route: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}{}/{}",
            self.base_url,
            route,
            self.bucket,
            encode_key(key)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
            .header("apikey", &self.service_key)
    }

    /// Ask the platform for a signed upload URL on `key`.
    pub async fn create_signed_upload_url(&self, key: &str) -> StorageResult<String> {
        let response = self
            .authorized(self.http.post(self.object_url("upload/sign/", key)))
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let response = ensure_success(response).await?;
        let body: SignedUploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        Ok(format!("{}/storage/v1{}", self.base_url, body.url))
    }

    /// List a folder, filtered by a name search.
    pub async fn list(&self, prefix: &str, search: &str) -> StorageResult<Vec<PlatformObject>> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
        let response = self
            .authorized(self.http.post(url))
            .json(&ListRequest {
                prefix,
                search,
                limit: LIST_PAGE_LIMIT,
                offset: 0,
            })
            .send()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))
    }

    /// Exact-name lookup of a single object.
    pub async fn find(&self, key: &str) -> StorageResult<Option<PlatformObject>> {
        let (folder, name) = key.rsplit_once('/').unwrap_or(("", key));
        let entries = self.list(folder, name).await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.name == name && entry.id.is_some()))
    }

    pub async fn get_object(&self, key: &str) -> StorageResult<Response> {
        let response = self
            .authorized(self.http.get(self.object_url("authenticated/", key)))
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if is_not_found(status, &body) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Err(StorageError::DownloadFailed(format!("{}: {}", status, body)))
    }

    pub async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        let response = self
            .authorized(self.http.post(self.object_url("", key)))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::UploadFailed(format!("{}: {}", status, body)))
    }
}

impl std::fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// The platform reports missing objects as 404, or as 400 with a `not_found` error body.
fn is_not_found(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        || (status == StatusCode::BAD_REQUEST
            && (body.contains("not_found") || body.contains("Object not found")))
}

async fn ensure_success(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::BackendError(format!("{}: {}", status, body)))
}

/// Platform storage implementation
#[derive(Clone)]
pub struct PlatformStorage {
    client: Arc<PlatformClient>,
}

impl PlatformStorage {
    pub fn new(client: Arc<PlatformClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for PlatformStorage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Platform
    }

    fn bucket(&self) -> &str {
        self.client.bucket()
    }

    async fn issue_upload_target(&self) -> StorageResult<UploadTarget> {
        let key = allocate_upload_key();
        let canonical_address = CanonicalAddress::from_key(&key)?;

        let url = self.client.create_signed_upload_url(&key).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.client.bucket(),
                key = %key,
                "Platform signed upload URL failed"
            );
            e
        })?;

        tracing::debug!(bucket = %self.client.bucket(), key = %key, "Platform upload URL issued");

        Ok(UploadTarget {
            method: UploadMethod::Put,
            url,
            canonical_address,
            expires_in: Duration::from_secs(PLATFORM_SIGNED_UPLOAD_EXPIRY_SECS),
        })
    }

    async fn resolve_address(&self, address: &str) -> StorageResult<BackendHandle> {
        let handle = handle_from_address(StorageBackend::Platform, self.client.bucket(), address)?;
        match self.client.find(&handle.key).await? {
            Some(_) => Ok(handle),
            None => Err(StorageError::NotFound(handle.key)),
        }
    }

    async fn open_download(&self, handle: &BackendHandle) -> StorageResult<ObjectDownload> {
        let start = std::time::Instant::now();

        let response = self.client.get_object(&handle.key).await.map_err(|e| {
            if !e.is_not_found() {
                tracing::error!(
                    error = %e,
                    bucket = %handle.bucket,
                    key = %handle.key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Platform download failed"
                );
            }
            e
        })?;

        let metadata = ObjectMetadata {
            content_type: response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            content_length: response.content_length(),
        };

        tracing::info!(
            bucket = %handle.bucket,
            key = %handle.key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Platform download started"
        );

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StorageError::DownloadFailed(e.to_string())));

        Ok(ObjectDownload {
            metadata,
            stream: Box::pin(stream),
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.client.find(key).await?.is_some())
    }

    async fn upload_with_key(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        self.client
            .put_object(key, data, content_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.client.bucket(),
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Platform upload failed"
                );
                e
            })?;

        tracing::info!(
            bucket = %self.client.bucket(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Platform upload successful"
        );
        Ok(())
    }

    async fn recover_content_type(&self, handle: &BackendHandle) -> StorageResult<Option<String>> {
        Ok(self
            .client
            .find(&handle.key)
            .await?
            .and_then(|object| object.metadata)
            .and_then(|metadata| metadata.mimetype))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn storage_for(server: &Server) -> PlatformStorage {
        let credentials = PlatformCredentials {
            url: server.url(),
            service_key: "service-role-key".to_string(),
            bucket: "patient-files".to_string(),
        };
        let client = PlatformClient::new(&credentials, Duration::from_secs(5)).unwrap();
        PlatformStorage::new(Arc::new(client))
    }

    fn listing(names: &[(&str, &str)]) -> String {
        let entries: Vec<serde_json::Value> = names
            .iter()
            .map(|(name, mimetype)| {
                serde_json::json!({
                    "name": name,
                    "id": "0d9c7c7e-2f4f-4a8e-9d50-1c1f0f1b2a3c",
                    "metadata": { "mimetype": mimetype, "size": 1024 }
                })
            })
            .collect();
        serde_json::Value::Array(entries).to_string()
    }

    #[tokio::test]
    async fn issues_signed_upload_url_under_project_url() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                Matcher::Regex(r"^/storage/v1/object/upload/sign/patient-files/uploads/[0-9a-f-]{36}$".to_string()),
            )
            .match_header("apikey", "service-role-key")
            .match_header("authorization", "Bearer service-role-key")
            .with_status(200)
            .with_body(r#"{"url":"/object/upload/sign/patient-files/uploads/x?token=abc"}"#)
            .create_async()
            .await;

        let target = storage_for(&server).issue_upload_target().await.unwrap();

        mock.assert_async().await;
        assert_eq!(target.method, UploadMethod::Put);
        assert_eq!(
            target.url,
            format!(
                "{}/storage/v1/object/upload/sign/patient-files/uploads/x?token=abc",
                server.url()
            )
        );
        assert_eq!(target.expires_in, Duration::from_secs(7200));
        assert!(target.canonical_address.key().starts_with("uploads/"));
    }

    #[tokio::test]
    async fn resolve_requires_the_object_in_the_listing() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/storage/v1/object/list/patient-files")
            .match_body(Matcher::PartialJson(
                serde_json::json!({"prefix": "uploads", "search": "abc-123"}),
            ))
            .with_status(200)
            .with_body(listing(&[("abc-123", "image/png")]))
            .create_async()
            .await;
        server
            .mock("POST", "/storage/v1/object/list/patient-files")
            .match_body(Matcher::PartialJson(
                serde_json::json!({"prefix": "uploads", "search": "gone"}),
            ))
            .with_status(200)
            .with_body(listing(&[("gone-but-similar", "image/png")]))
            .create_async()
            .await;

        let storage = storage_for(&server);
        let handle = storage
            .resolve_address("/api/objects/uploads/abc-123")
            .await
            .unwrap();
        assert_eq!(handle.backend, StorageBackend::Platform);
        assert_eq!(handle.key, "uploads/abc-123");

        let err = storage
            .resolve_address("/api/objects/uploads/gone")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn recovers_content_type_from_listing_metadata() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/storage/v1/object/list/patient-files")
            .with_status(200)
            .with_body(listing(&[("scan.pdf", "application/pdf")]))
            .create_async()
            .await;

        let storage = storage_for(&server);
        let handle = BackendHandle {
            backend: StorageBackend::Platform,
            bucket: "patient-files".to_string(),
            key: "uploads/scan.pdf".to_string(),
        };
        assert_eq!(
            storage.recover_content_type(&handle).await.unwrap().as_deref(),
            Some("application/pdf")
        );
    }

    #[tokio::test]
    async fn downloads_with_metadata_and_maps_missing_objects() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/storage/v1/object/authenticated/patient-files/uploads/photo")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body("jpeg-bytes")
            .create_async()
            .await;
        server
            .mock("GET", "/storage/v1/object/authenticated/patient-files/uploads/missing")
            .with_status(400)
            .with_body(r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/storage/v1/object/authenticated/patient-files/uploads/broken")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let storage = storage_for(&server);
        let handle = |key: &str| BackendHandle {
            backend: StorageBackend::Platform,
            bucket: "patient-files".to_string(),
            key: key.to_string(),
        };

        let (bytes, metadata) = storage.download(&handle("uploads/photo")).await.unwrap();
        assert_eq!(&bytes[..], b"jpeg-bytes");
        assert_eq!(metadata.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(metadata.content_length, Some(10));

        let missing = storage.download(&handle("uploads/missing")).await.unwrap_err();
        assert!(matches!(missing, StorageError::NotFound(_)));

        let broken = storage.download(&handle("uploads/broken")).await.unwrap_err();
        assert!(matches!(broken, StorageError::DownloadFailed(_)));
    }

    #[tokio::test]
    async fn upload_refuses_to_overwrite() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/storage/v1/object/patient-files/uploads/new")
            .match_header("x-upsert", "false")
            .match_header("content-type", "application/pdf")
            .match_body("pdf-bytes")
            .with_status(200)
            .with_body(r#"{"Key":"patient-files/uploads/new"}"#)
            .create_async()
            .await;

        storage_for(&server)
            .upload_with_key("uploads/new", Bytes::from_static(b"pdf-bytes"), "application/pdf")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn encodes_each_key_segment() {
        assert_eq!(encode_key("legacy/x ray.png"), "legacy/x%20ray.png");
    }
}
