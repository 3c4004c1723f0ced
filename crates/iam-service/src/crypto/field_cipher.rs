//! Reversible field encryption for PII at rest.
//!
//! AES-GCM with a fresh 96-bit random nonce per call. The stored form is
//! `hex(nonce || ciphertext || tag)`, so two encryptions of the same
//! plaintext never match and the ciphertext cannot serve as a lookup key.

use crate::errors::IamError;
use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, NONCE_LEN},
    rand::{SecureRandom, SystemRandom},
};
use std::fmt;
use tracing::instrument;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Symmetric authenticated encryption for individual string fields.
pub trait FieldCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, IamError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, IamError>;
}

/// `ring` AES-GCM implementation of [`FieldCipher`].
///
/// A 16-byte key selects AES-128-GCM and a 32-byte key selects AES-256-GCM.
pub struct AesGcmFieldCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmFieldCipher {
    pub fn new(key: &[u8]) -> Result<Self, IamError> {
        let algorithm = match key.len() {
            16 => &AES_128_GCM,
            32 => &AES_256_GCM,
            other => {
                return Err(IamError::Validation(format!(
                    "Invalid field encryption key length: {} (expected 16 or 32)",
                    other
                )))
            }
        };

        let unbound = UnboundKey::new(algorithm, key)
            .map_err(|_| IamError::Crypto("Invalid field encryption key".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    pub fn from_hex(key_hex: &str) -> Result<Self, IamError> {
        let bytes = hex::decode(key_hex.trim()).map_err(|e| {
            IamError::Validation(format!("Field encryption key is not valid hex: {}", e))
        })?;
        Self::new(&bytes)
    }
}

impl fmt::Debug for AesGcmFieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmFieldCipher")
            .field("algorithm", self.key.algorithm())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl FieldCipher for AesGcmFieldCipher {
    #[instrument(skip_all)]
    fn encrypt(&self, plaintext: &str) -> Result<String, IamError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| IamError::Crypto("Nonce generation failed".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| IamError::Crypto("Encryption operation failed".to_string()))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + in_out.len());
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&in_out);
        Ok(hex::encode(framed))
    }

    #[instrument(skip_all)]
    fn decrypt(&self, ciphertext: &str) -> Result<String, IamError> {
        let framed = hex::decode(ciphertext).map_err(|_| {
            tracing::debug!(target: "iam.crypto", "Ciphertext is not valid hex");
            IamError::Crypto("Ciphertext is not valid hex".to_string())
        })?;

        if framed.len() < NONCE_LEN + TAG_LEN {
            tracing::debug!(
                target: "iam.crypto",
                len = framed.len(),
                min = NONCE_LEN + TAG_LEN,
                "Ciphertext shorter than nonce and tag"
            );
            return Err(IamError::Crypto("Ciphertext too short".to_string()));
        }

        let (nonce_bytes, sealed) = framed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| IamError::Crypto("Invalid nonce".to_string()))?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| {
                crate::observability::metrics::record_crypto_failure("decrypt");
                IamError::Crypto("Decryption operation failed".to_string())
            })?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| IamError::Crypto("Decrypted field is not valid UTF-8".to_string()))
    }
}
