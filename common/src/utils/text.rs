use sha2::{Digest, Sha256};

/// Collapse every whitespace run to a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 hex digest of the whitespace-normalized text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collapse_whitespace(text).as_bytes());
    format!("{:x}", hasher.finalize())
}
