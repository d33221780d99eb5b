/// Password hashing, verification and strength rules using Argon2id
///
/// Hashes are PHC strings (algorithm, parameters, salt and hash in one
/// value) so they can be stored as-is and verified without extra state.
/// Cost parameters come from `security.password_hash`.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use warden_core::PasswordHashConfig;

use super::error::AuthError;

/// Characters accepted as the "special" category
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*";

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Fixed input for the timing-equalization hash
const DUMMY_PASSWORD: &str = "warden-dummy-password-for-timing";

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

/// Hashing, verification and strength validation
///
/// Clones share the comparison counter.
#[derive(Clone)]
pub struct PasswordPolicy {
    argon2: Argon2<'static>,
    dummy_hash: String,
    comparisons: Arc<AtomicU64>,
}

impl std::fmt::Debug for PasswordPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordPolicy")
            .field("params", self.argon2.params())
            .field("comparisons", &self.comparisons())
            .finish()
    }
}

impl PasswordPolicy {
    /// Build a policy with the given Argon2id cost.
    ///
    /// Computes the dummy hash up front, so construction costs one full hash.
    pub fn new(config: &PasswordHashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;

        Ok(Self {
            argon2,
            dummy_hash,
            comparisons: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Hash a plaintext password into a salted PHC string
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        hash_with(&self.argon2, password)
    }

    /// Verify a plaintext password against a stored hash.
    ///
    /// A malformed hash verifies as `false` without a comparison.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            tracing::warn!("Stored password hash is not a valid PHC string");
            return false;
        };

        self.comparisons.fetch_add(1, Ordering::Relaxed);
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Argon2 comparisons performed so far
    pub fn comparisons(&self) -> u64 {
        self.comparisons.load(Ordering::Relaxed)
    }

    /// Hash of a fixed placeholder, produced with the same parameters as
    /// real hashes. Verifying against it costs one full comparison.
    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }

    /// Check the password against the strength rules.
    ///
    /// Every missing requirement is reported in a single `WeakPassword`.
    pub fn validate_strength(&self, password: &str) -> Result<(), AuthError> {
        validate_strength(password)
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
    Ok(hash.to_string())
}

/// Strength rules: at least 8 characters, and at least one ASCII uppercase
/// letter, ASCII lowercase letter, ASCII digit and one of `!@#$%^&*`.
pub fn validate_strength(password: &str) -> Result<(), AuthError> {
    let mut missing = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        missing.push("at least 8 characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        missing.push("an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        missing.push("a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        missing.push(format!("a special character ({SPECIAL_CHARACTERS})"));
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::WeakPassword(format!(
            "password must contain {}",
            missing.join(", ")
        )))
    }
}
