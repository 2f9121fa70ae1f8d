//! Medvault Storage Library
//!
//! Storage gateway for clinical files. One [`ObjectStorage`] implementation per
//! backend protocol (an S3-compatible endpoint and the managed storage
//! platform), a factory that picks the active one from configuration, and the
//! canonical address scheme every stored reference is reduced to.
//!
//! # Canonical addresses
//!
//! Every object is addressed as `/api/objects/<key>`. Keys for new uploads are
//! always `uploads/<uuid>`, allocated in the `keys` module. Raw URL shapes found
//! in the database are mapped to canonical addresses by [`normalize`] and nowhere
//! else.

pub mod canonical;
pub mod clients;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod platform;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use canonical::{normalize, CanonicalAddress, UnrecognizedFormat};
pub use clients::{BackendClient, BackendClients, PlatformCredentials, S3Credentials};
pub use factory::{create_storage, storage_for};
#[cfg(feature = "storage-memory")]
pub use memory::InMemoryStorage;
pub use medvault_core::StorageBackend;
pub use platform::{PlatformClient, PlatformStorage};
pub use s3::{S3Client, S3Storage};
pub use traits::{
    BackendHandle, ByteStream, ObjectDownload, ObjectMetadata, ObjectStorage, StorageError,
    StorageResult, UploadMethod, UploadTarget, Visibility,
};
