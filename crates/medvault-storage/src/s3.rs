use crate::clients::S3Credentials;
use crate::keys::allocate_upload_key;
use crate::traits::{
    handle_from_address, BackendHandle, ObjectDownload, ObjectMetadata, ObjectStorage,
    StorageError, StorageResult, UploadMethod, UploadTarget,
};
use crate::{CanonicalAddress, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::sync::Arc;
use std::time::Duration;

/// Connected S3-compatible store for one bucket.
#[derive(Debug)]
pub struct S3Client {
    store: AmazonS3,
    bucket: String,
}

impl S3Client {
    /// Build the store from a complete credential set. No request is made here.
    pub fn connect(credentials: &S3Credentials, timeout: Duration) -> StorageResult<Self> {
        let allow_http = credentials.endpoint.starts_with("http://");
        let store = AmazonS3Builder::new()
            .with_access_key_id(credentials.access_key_id.clone())
            .with_secret_access_key(credentials.secret_access_key.clone())
            .with_endpoint(credentials.endpoint.clone())
            .with_region(credentials.region.clone())
            .with_bucket_name(credentials.bucket.clone())
            .with_virtual_hosted_style_request(false)
            .with_allow_http(allow_http)
            .with_client_options(ClientOptions::new().with_timeout(timeout))
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            store,
            bucket: credentials.bucket.clone(),
        })
    }

    pub fn store(&self) -> &AmazonS3 {
        &self.store
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    client: Arc<S3Client>,
    upload_expiry: Duration,
}

impl S3Storage {
    pub fn new(client: Arc<S3Client>, upload_expiry: Duration) -> Self {
        Self {
            client,
            upload_expiry,
        }
    }

    fn bucket_name(&self) -> &str {
        self.client.bucket()
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }

    fn bucket(&self) -> &str {
        self.bucket_name()
    }

    async fn issue_upload_target(&self) -> StorageResult<UploadTarget> {
        let key = allocate_upload_key();
        let canonical_address = CanonicalAddress::from_key(&key)?;
        let location = Path::from(key.clone());

        let url_result: ObjectResult<_> = self
            .client
            .store()
            .signed_url(Method::PUT, &location, self.upload_expiry)
            .await;

        let url = url_result
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket_name(),
                    key = %key,
                    "S3 presign failed"
                );
                StorageError::BackendError(e.to_string())
            })?
            .to_string();

        tracing::debug!(
            bucket = %self.bucket_name(),
            key = %key,
            expires_in_secs = self.upload_expiry.as_secs(),
            "S3 upload URL issued"
        );

        Ok(UploadTarget {
            method: UploadMethod::Put,
            url,
            canonical_address,
            expires_in: self.upload_expiry,
        })
    }

    async fn resolve_address(&self, address: &str) -> StorageResult<BackendHandle> {
        handle_from_address(StorageBackend::S3, self.bucket_name(), address)
    }

    async fn open_download(&self, handle: &BackendHandle) -> StorageResult<ObjectDownload> {
        let start = std::time::Instant::now();
        let location = Path::from(handle.key.clone());

        let result: ObjectResult<_> = self.client.store().get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(handle.key.clone()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %handle.bucket,
                    key = %handle.key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let metadata = ObjectMetadata {
            content_type: result.attributes.get(&Attribute::ContentType).map(|v| {
                let value: &str = v.as_ref();
                value.to_string()
            }),
            content_length: Some(result.meta.size),
        };

        tracing::info!(
            bucket = %handle.bucket,
            key = %handle.key,
            size_bytes = result.meta.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download started"
        );

        let bucket = handle.bucket.clone();
        let key = handle.key.clone();
        let stream = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "S3 stream download error"
                );
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(ObjectDownload {
            metadata,
            stream: Box::pin(stream),
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Path::from(key.to_string());
        match self.client.store().head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn upload_with_key(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let location = Path::from(key.to_string());
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> = self
            .client
            .store()
            .put_opts(&location, PutPayload::from(data), options)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket_name(),
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket_name(),
            key = %key,
            size_bytes = size,
            content_type = %content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }
}
