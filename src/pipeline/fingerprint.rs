//! Content fingerprints for change detection.

use sha2::{Digest, Sha256};

/// Hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 16;

/// Short deterministic digest of an item's text.
///
/// Only used to notice edits; two different ids with the same text share a
/// fingerprint.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}
