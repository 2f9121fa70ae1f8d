//! Batch tools for the object storage gateway.
//!
//! Three binaries share this library: `repair_references` rewrites stored
//! references into canonical form, `migrate_objects` copies objects between
//! backends and repoints references, and `diagnose_storage` reports where each
//! referenced object actually lives. All of them run offline, one object at a
//! time, and keep going after per-object failures.

pub mod diagnose;
pub mod migrate;
pub mod repair;
pub mod setup;

#[cfg(test)]
pub(crate) mod test_helpers;

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_counts_characters() {
        assert_eq!(truncate_string("éééééé", 5), "éé...");
    }
}
