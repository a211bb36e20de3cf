use crate::error::AuthError;

/// Password hashing collaborator. Production uses bcrypt; tests substitute
/// a transparent fake so they stay fast.
pub trait PasswordHasher: Send + Sync {
    fn encode(&self, raw: &str) -> Result<String, AuthError>;
    fn matches(&self, raw: &str, hash: &str) -> Result<bool, AuthError>;
}

pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl PasswordHasher for BcryptHasher {
    fn encode(&self, raw: &str) -> Result<String, AuthError> {
        Ok(bcrypt::hash(raw, self.cost)?)
    }

    fn matches(&self, raw: &str, hash: &str) -> Result<bool, AuthError> {
        Ok(bcrypt::verify(raw, hash)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcrypt_round_trip() {
        // Minimum cost keeps the test quick.
        let hasher = BcryptHasher::new(4);
        let hash = hasher.encode("s3cret").unwrap();
        assert!(hasher.matches("s3cret", &hash).unwrap());
        assert!(!hasher.matches("wrong", &hash).unwrap());
    }
}
