//! Secret wrappers for values that must never reach a log line.
//!
//! Re-exports the [`secrecy`] types and adds [`SecretBytes`], the shape every
//! Parley key (field cipher key, search-key secret, token signing secrets) is
//! held in once it has been decoded from its hex configuration value.
//!
//! `SecretBox<T>` and `SecretString` print `[REDACTED]` from their `Debug`
//! impls, so a struct that derives `Debug` over them stays safe to trace.
//! Their contents are zeroized on drop.
//!
//! # Usage
//!
//! ```rust
//! use common::secret::{secret_bytes, ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     identifier: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     identifier: "alice@example.com".to_string(),
//!     password: SecretString::from("Hunter2!pass"),
//! };
//! assert!(!format!("{req:?}").contains("Hunter2"));
//!
//! let key = secret_bytes(vec![7u8; 32]);
//! assert_eq!(key.expose_secret().len(), 32);
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// Decoded binary key material.
pub type SecretBytes = SecretBox<Vec<u8>>;

/// Wrap raw key bytes so they are redacted in `Debug` and zeroized on drop.
#[must_use]
pub fn secret_bytes(bytes: Vec<u8>) -> SecretBytes {
    SecretBox::new(Box::new(bytes))
}

/// Clone a [`SecretBytes`] explicitly.
///
/// Config structs that are cloned into per-component constructors copy
/// their keys through here.
#[must_use]
pub fn clone_secret_bytes(secret: &SecretBytes) -> SecretBytes {
    secret_bytes(secret.expose_secret().clone())
}
