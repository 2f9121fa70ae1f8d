//! Key allocation for new uploads.
//!
//! Key format: `uploads/{uuid}`. The id is random, never reused and never
//! derived from anything the client sends.

use medvault_core::constants::UPLOADS_SEGMENT;
use uuid::Uuid;

/// Allocate a fresh bucket-relative key for an upload.
pub fn allocate_upload_key() -> String {
    format!("{}/{}", UPLOADS_SEGMENT, Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_live_under_uploads_and_never_repeat() {
        let keys: HashSet<String> = (0..1000).map(|_| allocate_upload_key()).collect();
        assert_eq!(keys.len(), 1000);
        assert!(keys.iter().all(|k| k.starts_with("uploads/") && k.len() == 8 + 36));
    }
}
