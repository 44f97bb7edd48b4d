//! Thin logging helpers over the `log` facade, used for the handful of
//! events worth surfacing to an embedding application: index maintenance,
//! flush/close, and the dotted-key deprecation warning. General-purpose
//! logging configuration is left to the embedding application; this crate
//! only emits through the facade.

use log::{debug, info, warn};

pub fn log_index_built(key: &str, bucket_count: usize) {
    debug!("built index on {:?} with {} distinct values", key, bucket_count);
}

pub fn log_flush(path: Option<&str>, doc_count: usize) {
    match path {
        Some(path) => info!("flushed {} documents to {}", doc_count, path),
        None => debug!("flushed {} documents (no backing file)", doc_count),
    }
}

pub fn log_close(path: Option<&str>) {
    match path {
        Some(path) => info!("closed collection backed by {}", path),
        None => debug!("closed in-memory collection"),
    }
}

/// A flat dotted key collided with a literal key containing the same
/// dots; both are matched, but callers should migrate off the literal
/// form since it may be dropped in a future revision.
pub fn log_dotted_key_deprecation(key: &str) {
    warn!(
        "field key {:?} contains a literal '.'; matching both the nested path and the flat key \
         is deprecated and may be removed in a future revision",
        key
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_do_not_panic() {
        log_index_built("age", 3);
        log_flush(Some("docs.ndjson"), 2);
        log_flush(None, 0);
        log_close(None);
        log_dotted_key_deprecation("a.b");
    }
}
