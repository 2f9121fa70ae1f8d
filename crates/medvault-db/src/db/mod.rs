//! Database repositories for data access layer
//
// Connection pool setup
pub mod pool;
//
// Object reference columns (patient avatars, file attachments)
pub mod references;
