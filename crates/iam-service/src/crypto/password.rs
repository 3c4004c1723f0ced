//! Credential hashing.
//!
//! Passwords never pass through the field cipher; they are one-way hashed
//! with bcrypt at the configured cost.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::IamError;
use tracing::instrument;

/// Bcrypt hash verified when the login subject does not exist, so the
/// response time does not reveal whether an account is registered.
pub const DUMMY_PASSWORD_HASH: &str =
    "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Hash a password with bcrypt.
///
/// # Errors
///
/// Returns `IamError::Crypto` if the cost is outside 10-14 or hashing fails.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, IamError> {
    // Config validates the cost too; this guards direct callers.
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(IamError::Crypto(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    bcrypt::hash(password, cost)
        .map_err(|e| IamError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a bcrypt hash.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> Result<bool, IamError> {
    bcrypt::verify(password, hash)
        .map_err(|e| IamError::Crypto(format!("Password verification failed: {}", e)))
}

/// Burn the same bcrypt work as a real verification and discard the result.
#[instrument(skip_all)]
pub fn verify_dummy_password(password: &str) {
    let _ = bcrypt::verify(password, DUMMY_PASSWORD_HASH);
}
