//! SHA-256 hashing utilities for content addressing.

use sha2::{Digest, Sha256};

/// Compute the lowercase hex SHA-256 of data
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash several byte sequences as if they were concatenated in order
pub fn sha256_hex_parts<I, B>(parts: I) -> String
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref());
    }
    hex::encode(hasher.finalize())
}
