//! Search-key hashing.
//!
//! Lookup attributes (username, email, phone, refresh tokens) are stored as
//! HMAC-SHA256 digests of their normalized plaintext. The digest is
//! deterministic, so an equality query hashes the query value and compares
//! hashes; the encrypted twin of the attribute is never compared.

use crate::config::MIN_MAC_SECRET_BYTES;
use crate::errors::IamError;
use common::secret::{secret_bytes, ExposeSecret, SecretBytes};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use tracing::instrument;

type HmacSha256 = Hmac<Sha256>;

/// Deterministic keyed one-way transform used as a lookup index.
pub trait SearchKeyHasher: Send + Sync {
    /// Hash `value` after trimming surrounding whitespace and lowercasing.
    ///
    /// Same input and same key always produce the same lowercase hex string.
    fn generate_search_key(&self, value: &str) -> Result<String, IamError>;
}

/// Normalize a lookup value before hashing.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// HMAC-SHA256 implementation of [`SearchKeyHasher`].
pub struct HmacSearchKeyHasher {
    secret: SecretBytes,
}

impl HmacSearchKeyHasher {
    /// Build a hasher from raw key bytes.
    ///
    /// Fails closed with `Validation` if the key is shorter than the SHA-256
    /// output size.
    pub fn new(secret: &[u8]) -> Result<Self, IamError> {
        if secret.len() < MIN_MAC_SECRET_BYTES {
            return Err(IamError::Validation(format!(
                "Search key secret must be at least {} bytes, got {}",
                MIN_MAC_SECRET_BYTES,
                secret.len()
            )));
        }
        Ok(Self {
            secret: secret_bytes(secret.to_vec()),
        })
    }

    /// Build a hasher from a hex-encoded key.
    pub fn from_hex(secret_hex: &str) -> Result<Self, IamError> {
        let bytes = hex::decode(secret_hex.trim()).map_err(|e| {
            IamError::Validation(format!("Search key secret is not valid hex: {}", e))
        })?;
        Self::new(&bytes)
    }
}

impl fmt::Debug for HmacSearchKeyHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSearchKeyHasher")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SearchKeyHasher for HmacSearchKeyHasher {
    #[instrument(skip_all)]
    fn generate_search_key(&self, value: &str) -> Result<String, IamError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret())
            .map_err(|e| IamError::Crypto(format!("HMAC initialization failed: {}", e)))?;
        mac.update(normalize(value).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
