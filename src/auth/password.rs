//! Password hashing and verification.
//!
//! Digests are Argon2id PHC strings. The parameters used to produce a digest
//! are encoded inside it, so raising the configured cost never breaks
//! verification of older digests.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Invalid hash parameters: {0}")]
    InvalidParams(String),

    #[error("Password hashing failed: {0}")]
    HashingError(String),
}

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// `cost` is the Argon2 iteration count applied to new digests.
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(Params::DEFAULT_M_COST, cost, Params::DEFAULT_P_COST, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::HashingError(e.to_string()))
    }

    /// Never errors: a digest that cannot be parsed simply does not match.
    pub fn verify(&self, digest: &str, secret: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored password digest is malformed: {}", e);
                return false;
            }
        };

        // Argon2::default() reads algorithm and cost from the digest itself.
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}
