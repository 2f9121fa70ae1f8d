use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend types
///
/// `S3` is any S3-compatible endpoint addressed with access-key credentials.
/// `Platform` is the managed storage platform that hands out bucket-scoped,
/// policy-signed URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Platform,
}

impl StorageBackend {
    pub const ALL: [StorageBackend; 2] = [StorageBackend::S3, StorageBackend::Platform];
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid storage backend: {0} (expected 's3' or 'platform')")]
pub struct ParseStorageBackendError(String);

impl FromStr for StorageBackend {
    type Err = ParseStorageBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "platform" => Ok(StorageBackend::Platform),
            _ => Err(ParseStorageBackendError(s.to_string())),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Platform => write!(f, "platform"),
        }
    }
}
