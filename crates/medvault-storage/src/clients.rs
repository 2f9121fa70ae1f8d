//! Backend client factory.
//!
//! Each backend's client is built at most once per process, on first use, from
//! the credential set in [`StorageSettings`]. A missing credential fails the
//! build with [`StorageError::NotConfigured`] naming every absent variable, and
//! a failed build is not cached.

use crate::platform::PlatformClient;
use crate::s3::S3Client;
use crate::traits::{StorageError, StorageResult};
use crate::StorageBackend;
use medvault_core::config::keys;
use medvault_core::StorageSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
}

impl S3Credentials {
    pub fn from_settings(settings: &StorageSettings) -> StorageResult<Self> {
        let mut missing = Vec::new();
        let access_key_id = required(&settings.s3_access_key_id, keys::S3_ACCESS_KEY_ID, &mut missing);
        let secret_access_key = required(
            &settings.s3_secret_access_key,
            keys::S3_SECRET_ACCESS_KEY,
            &mut missing,
        );
        let endpoint = required(&settings.s3_endpoint, keys::S3_ENDPOINT, &mut missing);

        match (access_key_id, secret_access_key, endpoint) {
            (Some(access_key_id), Some(secret_access_key), Some(endpoint)) => Ok(Self {
                access_key_id,
                secret_access_key,
                endpoint,
                region: settings.s3_region.clone(),
                bucket: settings.s3_bucket.clone(),
            }),
            _ => Err(StorageError::NotConfigured {
                backend: StorageBackend::S3,
                missing,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformCredentials {
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

impl PlatformCredentials {
    pub fn from_settings(settings: &StorageSettings) -> StorageResult<Self> {
        let mut missing = Vec::new();
        let url = required(&settings.platform_url, keys::PLATFORM_STORAGE_URL, &mut missing);
        let service_key = required(
            &settings.platform_service_key,
            keys::PLATFORM_SERVICE_KEY,
            &mut missing,
        );

        match (url, service_key) {
            (Some(url), Some(service_key)) => Ok(Self {
                url,
                service_key,
                bucket: settings.platform_bucket.clone(),
            }),
            _ => Err(StorageError::NotConfigured {
                backend: StorageBackend::Platform,
                missing,
            }),
        }
    }
}

fn required(
    value: &Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<String> {
    if value.is_none() {
        missing.push(name);
    }
    value.clone()
}

/// A constructed client for one backend.
#[derive(Debug, Clone)]
pub enum BackendClient {
    S3(Arc<S3Client>),
    Platform(Arc<PlatformClient>),
}

/// Process-wide cache of backend clients.
#[derive(Debug)]
pub struct BackendClients {
    settings: StorageSettings,
    s3: OnceCell<Arc<S3Client>>,
    platform: OnceCell<Arc<PlatformClient>>,
}

impl BackendClients {
    pub fn new(settings: StorageSettings) -> Self {
        Self {
            settings,
            s3: OnceCell::new(),
            platform: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.http_timeout_secs)
    }

    pub async fn s3(&self) -> StorageResult<Arc<S3Client>> {
        self.s3
            .get_or_try_init(|| async {
                let credentials = S3Credentials::from_settings(&self.settings)?;
                let client = S3Client::connect(&credentials, self.timeout())?;
                tracing::info!(
                    bucket = %credentials.bucket,
                    region = %credentials.region,
                    endpoint = %credentials.endpoint,
                    "S3 storage client initialized"
                );
                Ok::<_, StorageError>(Arc::new(client))
            })
            .await
            .cloned()
    }

    pub async fn platform(&self) -> StorageResult<Arc<PlatformClient>> {
        self.platform
            .get_or_try_init(|| async {
                let credentials = PlatformCredentials::from_settings(&self.settings)?;
                let client = PlatformClient::new(&credentials, self.timeout())?;
                tracing::info!(
                    bucket = %credentials.bucket,
                    url = %credentials.url,
                    "Platform storage client initialized"
                );
                Ok::<_, StorageError>(Arc::new(client))
            })
            .await
            .cloned()
    }

    pub async fn get_client(&self, backend: StorageBackend) -> StorageResult<BackendClient> {
        match backend {
            StorageBackend::S3 => self.s3().await.map(BackendClient::S3),
            StorageBackend::Platform => self.platform().await.map(BackendClient::Platform),
        }
    }

    /// Whether the backend's credential set is complete. Builds nothing.
    pub fn is_configured(&self, backend: StorageBackend) -> bool {
        match backend {
            StorageBackend::S3 => S3Credentials::from_settings(&self.settings).is_ok(),
            StorageBackend::Platform => PlatformCredentials::from_settings(&self.settings).is_ok(),
        }
    }
}
