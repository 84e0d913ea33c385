//! Password hashing and verification.
//!
//! Passwords are hashed with Argon2id and stored as PHC strings, so the salt
//! and cost parameters travel with the digest.

use argon2::{
    password_hash::{self, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
};
use once_cell::sync::OnceCell;
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

const DUMMY_PASSWORD: &str = "authgate-dummy-password";

#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to hash password: {0}")]
    Hash(password_hash::Error),
    #[error("malformed password hash: {0}")]
    Malformed(password_hash::Error),
    #[error("invalid hashing parameters: {0}")]
    Params(argon2::Error),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    // Digest hashed with the same parameters, for accounts that do not exist.
    dummy: Arc<OnceCell<String>>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
            dummy: Arc::default(),
        }
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

impl PasswordHasher {
    /// Argon2id with explicit cost parameters.
    ///
    /// # Errors
    /// Returns an error if the parameters are out of range.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params =
            Params::new(memory_kib, iterations, parallelism, None).map_err(HashError::Params)?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy: Arc::default(),
        })
    }

    /// Hash `plaintext` with a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if the hashing algorithm fails.
    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(HashError::Hash)?;

        Ok(hash.to_string())
    }

    /// Check `plaintext` against a stored digest.
    ///
    /// A mismatch is `Ok(false)`; only an unparseable digest is an error.
    ///
    /// # Errors
    /// Returns [`HashError::Malformed`] if `digest` is not a valid PHC string.
    pub fn verify(&self, digest: &str, plaintext: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(digest).map_err(HashError::Malformed)?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(HashError::Malformed(err)),
        }
    }

    /// Verify `plaintext` against a digest that matches no account, so that a
    /// lookup miss costs as much as a wrong password. Always `Ok(false)`.
    ///
    /// # Errors
    /// Returns an error if the dummy digest cannot be produced.
    pub fn verify_dummy(&self, plaintext: &str) -> Result<bool, HashError> {
        let digest = self.dummy.get_or_try_init(|| self.hash(DUMMY_PASSWORD))?;
        self.verify(digest, plaintext).map(|_| false)
    }

    /// [`Self::verify_dummy`] on the blocking thread pool.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the task panics.
    pub async fn verify_dummy_blocking(&self, plaintext: String) -> Result<bool, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_dummy(&plaintext)).await?
    }

    /// [`Self::hash`] on the blocking thread pool.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the task panics.
    pub async fn hash_blocking(&self, plaintext: String) -> Result<String, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await?
    }

    /// [`Self::verify`] on the blocking thread pool.
    ///
    /// # Errors
    /// Returns an error if the digest is malformed or the task panics.
    pub async fn verify_blocking(&self, digest: String, plaintext: String) -> Result<bool, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &plaintext)).await?
    }
}
