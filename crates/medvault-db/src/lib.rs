//! Medvault database access
//!
//! The gateway owns no tables. It reads the columns where other features keep
//! object references and rewrites them during repair and migration.

pub mod db;

pub use db::pool::connect;
pub use db::references::{ObjectReferenceRepository, PgObjectReferenceRepository};
