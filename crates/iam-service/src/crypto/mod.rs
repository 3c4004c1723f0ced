//! Cryptographic primitives for the identity core.
//!
//! - [`search_key`]: deterministic keyed hash for exact-match lookups
//! - [`field_cipher`]: reversible authenticated encryption for PII at rest
//! - [`password`]: bcrypt credential hashing
//! - [`token`]: HS256 access/refresh token codec
//!
//! Every primitive is pure and `Send + Sync`; they are shared across
//! requests behind `Arc<dyn ...>`.

pub mod field_cipher;
pub mod password;
pub mod search_key;
pub mod token;

pub use field_cipher::{AesGcmFieldCipher, FieldCipher};
pub use password::{hash_password, verify_password};
pub use search_key::{HmacSearchKeyHasher, SearchKeyHasher};
pub use token::{JwtTokenCodec, TokenCodec};
