//! Content fingerprinting for change detection.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of raw page bytes.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let html = b"<html><body>FCA regulated</body></html>";
        assert_eq!(content_hash(html), content_hash(html));
        assert_eq!(content_hash(html).len(), 64);
    }

    #[test]
    fn test_single_byte_change_changes_hash() {
        let a = b"<html><body>spread 0.1</body></html>".to_vec();
        let mut b = a.clone();
        b[20] ^= 0x01;
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
