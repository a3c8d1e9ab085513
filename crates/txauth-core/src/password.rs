/// Credential hashing and verification using Argon2id
///
/// Passwords are stored as PHC strings (`$argon2id$v=19$m=...`), which carry
/// their own random salt and cost parameters:
/// - Algorithm: Argon2id
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4 threads
/// - Salt: 16 bytes random
/// - Output: 32 bytes hash
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for tests and local development
    pub fn lightweight() -> Self {
        Self {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// One-way password hasher
///
/// `hash` produces a salted digest, `verify` checks a candidate plaintext
/// against a stored digest. Verification reads the cost parameters from the
/// digest itself, so hashes created under an older config keep verifying.
#[derive(Debug, Clone, Default)]
pub struct CredentialHasher {
    config: PasswordConfig,
}

impl CredentialHasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    /// Hash a plaintext password
    ///
    /// # Example
    ///
    /// ```no_run
    /// use txauth_core::password::CredentialHasher;
    ///
    /// let hasher = CredentialHasher::default();
    /// let hash = hasher.hash("Asd123@").expect("Failed to hash password");
    /// assert!(hash.starts_with("$argon2id$"));
    /// ```
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let params = self.config.to_params()?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let password_hash = argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// Verify a candidate plaintext against a stored digest
    ///
    /// * `Ok(true)` - Password matches
    /// * `Ok(false)` - Password does not match
    /// * `Err(PasswordError)` - The stored digest could not be parsed
    pub fn verify(&self, stored_digest: &str, candidate: &str) -> Result<bool, PasswordError> {
        let parsed_hash =
            PasswordHash::new(stored_digest).map_err(|_| PasswordError::InvalidHashFormat)?;

        match Argon2::default().verify_password(candidate.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(PasswordConfig::lightweight())
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("Asd123@").expect("Failed to hash password");

        assert!(hasher.verify(&hash, "Asd123@").unwrap());
        assert!(!hasher.verify(&hash, "Asd123@1").unwrap());
    }

    #[test]
    fn test_same_password_is_salted() {
        let hasher = hasher();
        let hash1 = hasher.hash("QWEqwe123!!@#").unwrap();
        let hash2 = hasher.hash("QWEqwe123!!@#").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify(&hash1, "QWEqwe123!!@#").unwrap());
        assert!(hasher.verify(&hash2, "QWEqwe123!!@#").unwrap());
    }

    #[test]
    fn test_hash_is_not_plaintext() {
        let hash = hasher().hash("Asd123@").unwrap();
        assert!(!hash.contains("Asd123@"));
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = hasher().verify("not-a-phc-string", "Asd123@");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_verify_with_other_config() {
        let strong = CredentialHasher::new(PasswordConfig {
            memory_cost: 16384,
            time_cost: 2,
            parallelism: 2,
            output_len: Some(32),
        });
        let hash = strong.hash("Qwe123!@!").unwrap();

        assert!(hash.contains("m=16384"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=2"));
        assert!(hasher().verify(&hash, "Qwe123!@!").unwrap());
    }
}
