//! Common utilities and types shared across Parley components.

#![warn(clippy::pedantic)]

/// Module for common identifier types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, claims, iat validation)
pub mod jwt;
