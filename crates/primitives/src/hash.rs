//! Hashing helpers.

use sha2::{Digest, Sha256};

/// Computes a SHA-256 over the concatenation of `parts`.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_concat_matches_single_buffer() {
        let joined = sha256_concat(&[b"peg", b"-in"]);
        let single = sha256_concat(&[b"peg-in"]);
        assert_eq!(joined, single);
    }
}
