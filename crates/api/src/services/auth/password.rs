//! Argon2id password hashing.
//!
//! Hashing is CPU bound, so the async entry points run it on the blocking
//! thread pool.

use std::sync::{Arc, LazyLock};

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
};

use super::AuthError;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length, bounding hashing work per request.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash compared against when the email is unknown, so a miss costs the same
/// as a wrong password.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    PasswordHasher::default()
        .hash_blocking("dummy-password-for-timing")
        .unwrap_or_default()
});

/// Argon2id hasher with fixed parameters.
///
/// Verification reads parameters from the stored PHC string, so hashes made
/// with other parameters still verify.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Arc<Argon2<'static>>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            argon2: Arc::new(Argon2::default()),
        }
    }
}

impl PasswordHasher {
    /// Minimal-cost parameters for tests. Never use in production.
    #[cfg(any(test, feature = "test-support"))]
    #[must_use]
    pub fn fast_insecure() -> Self {
        use argon2::{Algorithm, Params, Version};

        let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap_or_default();
        Self {
            argon2: Arc::new(Argon2::new(Algorithm::Argon2id, Version::V0x13, params)),
        }
    }

    /// Hash a password on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if hashing fails.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password))
            .await
            .map_err(|_| AuthError::PasswordHash)?
    }

    /// Verify a password against a stored hash on the blocking pool.
    ///
    /// `None` verifies against a dummy hash and always fails.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the password does not match.
    pub async fn verify(&self, password: &str, hash: Option<String>) -> Result<(), AuthError> {
        let hasher = self.clone();
        let password = password.to_owned();
        let known = hash.is_some();
        // The dummy hash is built lazily, so first use must also be off the
        // async worker.
        let verified = tokio::task::spawn_blocking(move || {
            let hash = hash.as_deref().unwrap_or(DUMMY_HASH.as_str());
            hasher.verify_blocking(&password, hash)
        })
        .await
        .map_err(|_| AuthError::PasswordHash)?;

        if known { verified } else { Err(AuthError::InvalidCredentials) }
    }

    fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHash)
    }

    fn verify_blocking(&self, password: &str, hash: &str) -> Result<(), AuthError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

/// Check password length bounds.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the violated bound.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
