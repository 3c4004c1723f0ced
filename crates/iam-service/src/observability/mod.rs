//! Observability for the IAM service
//!
//! # Privacy by Default
//!
//! Instrumented functions use `#[instrument(skip_all)]` and record only
//! allow-listed fields. Fields fall into three groups:
//! - **SAFE**: may be logged as-is (token kind, action, resource type, reasons)
//! - **HASHED**: logged through [`hash_for_correlation`] (user IDs)
//! - **NEVER**: tokens, passwords, key material and any PII plaintext

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// A correlation aid, not a secret-protecting hash.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = hex::encode(digest);
    out.truncate(8);
    out
}
