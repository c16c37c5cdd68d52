//! Persona prompt fingerprints.
//!
//! Persona messages are user-authored and may be long or sensitive, so logs
//! carry a SHA-256 fingerprint instead of the text.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Compute a stable lowercase hex SHA-256 fingerprint for a prompt.
pub fn hash_prompt(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{:02x}", byte);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::hash_prompt;

    #[test]
    fn test_hash_prompt_stable() {
        assert_eq!(hash_prompt("persona"), hash_prompt("persona"));
        assert_ne!(hash_prompt("persona"), hash_prompt("another persona"));
    }

    #[test]
    fn test_hash_prompt_known_value() {
        assert_eq!(
            hash_prompt(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
