//! Credential policy for stored user passwords: Argon2 PHC strings only.

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password")]
    Hash(#[source] password_hash::Error),
    #[error("stored credential is not a usable argon2 hash")]
    MalformedHash(#[source] password_hash::Error),
}

/// True when `value` parses as an Argon2 PHC string carrying an actual hash.
fn is_argon2_hash(value: &str) -> bool {
    PasswordHash::new(value)
        .map(|parsed| Algorithm::new(parsed.algorithm.as_str()).is_ok() && parsed.hash.is_some())
        .unwrap_or(false)
}

/// Value to store for a credential: Argon2 hashes pass through, anything else
/// is hashed with a fresh salt.
pub fn hash_if_plain(value: &str) -> Result<String, PasswordError> {
    if is_argon2_hash(value) {
        return Ok(value.to_owned());
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(value.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

/// Check `plain` against a stored credential. A wrong password is `Ok(false)`;
/// a stored value that is not a PHC string is `MalformedHash`.
pub fn matches_stored(plain: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(PasswordError::MalformedHash)?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::MalformedHash(e)),
    }
}
