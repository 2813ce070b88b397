//! `contentHash = SHA-256(normalize(content))`.

use sha2::{Digest, Sha256};

/// Trims the page and collapses runs of whitespace to a single space, so
/// trivial formatting churn (extra blank lines, trailing spaces) doesn't
/// register as a content change.
pub fn normalize(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn content_hash(content: &str) -> String {
    let normalized = normalize(content);
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_differences_normalize_to_same_hash() {
        let a = content_hash("hello   world\n\n");
        let b = content_hash("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_hashes_differently() {
        assert_ne!(content_hash("hello world"), content_hash("goodbye world"));
    }

    #[test]
    fn hash_is_64_hex_chars() {
        assert_eq!(content_hash("x").len(), 64);
    }
}
