//! Medvault API Library
//!
//! HTTP surface of the storage gateway: upload-target issuance, the download
//! proxy and the bearer-token middleware guarding both.

mod api_doc;
pub mod constants;
mod handlers;
mod services;
pub mod setup;
pub mod telemetry;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
