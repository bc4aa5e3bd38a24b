//! Stable item keys derived from question content.

use sha2::{Digest, Sha256};

/// Hash question text into a 32-char hex key.
///
/// Surrounding whitespace is ignored so reformatting a question bank does not
/// orphan its review history.
pub fn item_key(text: &str) -> String {
    let hash = Sha256::digest(text.trim().as_bytes());
    hex::encode(&hash[..16])
}
