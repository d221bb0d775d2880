//! Salted one-way hashing for borrower credentials.
//!
//! Credentials are stored as Argon2id PHC strings. Verification goes through
//! the argon2 verifier, which compares digests in constant time.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, PasswordHash,
};

use crate::errors::{LendingError, Result};

/// hash a clear-text credential with a fresh random salt
pub fn hash_credential(credential: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(credential.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LendingError::Credential {
            message: e.to_string(),
        })
}

/// check a clear-text credential against a stored hash
pub fn verify_credential(credential: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| LendingError::Credential {
        message: "stored credential hash is malformed".to_string(),
    })?;

    match Argon2::default().verify_password(credential.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(LendingError::Credential {
            message: e.to_string(),
        }),
    }
}
