//! Constants shared by the gateway, the API and the batch tools.

/// Route prefix of every canonical object address.
pub const OBJECT_API_PREFIX: &str = "/api/objects";

/// First path segment of every key allocated at upload time.
pub const UPLOADS_SEGMENT: &str = "uploads";

/// Bucket used by both backends when none is configured.
pub const DEFAULT_BUCKET: &str = "patient-files";

/// Region used for the S3-compatible backend when none is configured.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Content type served when neither the backend nor the database knows better.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub const DEFAULT_DOWNLOAD_CACHE_SECONDS: u64 = 3600;

/// Lifetime of presigned S3 PUT URLs (15 minutes).
pub const DEFAULT_UPLOAD_URL_EXPIRY_SECS: u64 = 15 * 60;

/// The managed platform fixes the lifetime of signed upload URLs at two hours.
pub const PLATFORM_SIGNED_UPLOAD_EXPIRY_SECS: u64 = 2 * 60 * 60;

pub const DEFAULT_STORAGE_HTTP_TIMEOUT_SECS: u64 = 30;
