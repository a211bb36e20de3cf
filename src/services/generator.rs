use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Produces opaque bearer tokens and their storage hashes.
///
/// Plaintexts are N securely-random bytes encoded as unpadded url-safe
/// base64 (43 characters at the default 32 bytes). Storage and lookups use
/// the hex SHA-256 of the plaintext, so the plaintext itself never touches
/// the database.
pub struct TokenGenerator {
    byte_size: usize,
}

impl TokenGenerator {
    pub fn new(byte_size: usize) -> Self {
        Self { byte_size }
    }

    /// Character length of every plaintext this generator produces; the
    /// bearer gate uses this for its cheap shape check.
    pub fn token_length(&self) -> usize {
        (self.byte_size * 4 + 2) / 3
    }

    pub fn generate(&self) -> String {
        let mut bytes = vec![0u8; self.byte_size];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Deterministic one-way digest of the UTF-8 plaintext.
    pub fn hash(&self, plaintext: &str) -> String {
        hex::encode(Sha256::digest(plaintext.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tokens_are_43_url_safe_chars() {
        let generator = TokenGenerator::new(32);
        let token = generator.generate();
        assert_eq!(token.len(), 43);
        assert_eq!(generator.token_length(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn consecutive_tokens_differ() {
        let generator = TokenGenerator::new(32);
        assert_ne!(generator.generate(), generator.generate());
    }

    #[test]
    fn hash_is_deterministic_sha256_hex() {
        let generator = TokenGenerator::new(32);
        assert_eq!(generator.hash("hello"), generator.hash("hello"));
        assert_eq!(
            generator.hash("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn token_length_tracks_byte_size() {
        // Unpadded base64: ceil(4n/3) characters for n bytes.
        assert_eq!(TokenGenerator::new(16).token_length(), 22);
        assert_eq!(TokenGenerator::new(48).token_length(), 64);
    }
}
