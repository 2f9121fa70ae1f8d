//! Medvault Core Library
//!
//! This crate provides the configuration, error types and shared models used by
//! the storage gateway, the HTTP API and the batch tools.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, GatewayConfig, StorageSettings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{ObjectReference, ReferenceCollection};
pub use storage_types::{ParseStorageBackendError, StorageBackend};
