//! Route paths served by the gateway.

pub use medvault_core::constants::OBJECT_API_PREFIX;

/// Upload-target issuance.
pub const UPLOADS_PATH: &str = "/api/uploads";

/// Download proxy; the wildcard tail is the bucket-relative key.
pub const OBJECT_DOWNLOAD_ROUTE: &str = "/api/objects/{*key}";

pub const HEALTH_PATH: &str = "/health";
pub const OPENAPI_PATH: &str = "/api/openapi.json";

/// `Cache-Control` value for proxied downloads.
pub fn cache_control_value(max_age_seconds: u64) -> String {
    format!("private, max-age={}", max_age_seconds)
}
