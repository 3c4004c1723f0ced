//! JWT utilities shared across Parley services.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Clock skew bounds for `iat`/`exp`/`nbf` validation
//! - The session claims structure carried by access and refresh tokens
//! - `iat` validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Error messages are generic so callers cannot tell failure modes apart
//! - `sub` and `jti` are redacted in Debug output
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{check_size, validate_iat, SessionClaims, DEFAULT_CLOCK_SKEW};
//!
//! check_size(token)?;
//! // ... verify signature, decode claims ...
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Session tokens are around 300 bytes (HS256 signature, six claims). Anything
/// larger than this is rejected before base64 decoding or MAC verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default clock skew tolerance.
///
/// Tokens are minted and verified by the same service, so no tolerance is
/// applied unless configured.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(0);

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Configuration above this is refused at startup.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT pre-validation.
///
/// All variants render the same message. The variant itself is only used for
/// debug logging and metrics labels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

impl JwtValidationError {
    /// Bounded label for metrics and debug logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TokenTooLarge => "too_large",
            Self::MalformedToken => "malformed",
            Self::IatTooFarInFuture => "iat_in_future",
        }
    }
}

// =============================================================================
// Claims Types
// =============================================================================

/// Claims carried by both access and refresh tokens.
///
/// The two token kinds share this shape and are told apart only by the secret
/// that signed them.
///
/// # Fields
///
/// - `sub`: Subject (user ID)
/// - `iss`: Issuer
/// - `iat`: Issued-at timestamp (Unix epoch seconds)
/// - `nbf`: Not-before timestamp, always equal to `iat`
/// - `exp`: Expiration timestamp, `iat` plus the token lifetime
/// - `jti`: Random token ID (UUID v4), so two tokens minted in the same second
///   for the same subject never collide
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID) - redacted in Debug output.
    pub sub: String,

    /// Issuer.
    pub iss: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Not-before timestamp (Unix epoch seconds).
    pub nbf: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Unique token ID - redacted in Debug output.
    pub jti: String,
}

impl fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClaims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("exp", &self.exp)
            .field("jti", &"[REDACTED]")
            .finish()
    }
}

impl SessionClaims {
    /// Build claims for `subject`, issued at `iat` and valid for `lifetime_secs`.
    #[must_use]
    pub fn new(subject: &UserId, issuer: &str, iat: i64, lifetime_secs: i64) -> Self {
        Self {
            sub: subject.to_string(),
            iss: issuer.to_string(),
            iat,
            nbf: iat,
            exp: iat.saturating_add(lifetime_secs),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Parse the `sub` claim back into a [`UserId`].
    ///
    /// # Errors
    ///
    /// Returns `MalformedToken` if `sub` is not a UUID.
    pub fn subject(&self) -> Result<UserId, JwtValidationError> {
        self.sub
            .parse()
            .map_err(|_| JwtValidationError::MalformedToken)
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Reject tokens larger than [`MAX_JWT_SIZE_BYTES`] before any parsing.
///
/// # Errors
///
/// Returns `TokenTooLarge` for oversized tokens.
pub fn check_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }
    Ok(())
}

/// Validate that `iat` is not further in the future than `clock_skew` allows.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// Prefer [`validate_iat`] in production code. This variant exists so that
/// boundary conditions can be unit-tested without wall-clock dependence.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_max_clock_skew_is_10_minutes() {
        assert_eq!(MAX_CLOCK_SKEW.as_secs(), 600);
        assert!(DEFAULT_CLOCK_SKEW <= MAX_CLOCK_SKEW);
    }

    // -------------------------------------------------------------------------
    // check_size Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_check_size_accepts_limit() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES);
        assert!(check_size(&token).is_ok());
    }

    #[test]
    fn test_check_size_rejects_oversized() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(check_size(&token), Err(JwtValidationError::TokenTooLarge));
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_time() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now - 1, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_past_time() {
        let past = chrono::Utc::now().timestamp() - 3600;
        assert!(validate_iat(past, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        let result = validate_iat(far_future, MAX_CLOCK_SKEW);
        assert_eq!(result, Err(JwtValidationError::IatTooFarInFuture));
    }

    #[test]
    fn test_validate_iat_at_skew_boundary() {
        let now = 1_700_000_000_i64;
        let skew = Duration::from_secs(30);

        assert!(validate_iat_at(now + 30, skew, now).is_ok());
        assert_eq!(
            validate_iat_at(now + 31, skew, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_zero_skew_rejects_any_future() {
        let now = 1_700_000_000_i64;
        assert!(validate_iat_at(now, Duration::ZERO, now).is_ok());
        assert!(validate_iat_at(now + 1, Duration::ZERO, now).is_err());
    }

    // -------------------------------------------------------------------------
    // SessionClaims Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_session_claims_new_sets_time_window() {
        let subject = UserId(Uuid::from_u128(100));
        let claims = SessionClaims::new(&subject, "parley-iam", 1_000, 900);

        assert_eq!(claims.sub, subject.to_string());
        assert_eq!(claims.iss, "parley-iam");
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp, 1_900);
        assert!(Uuid::parse_str(&claims.jti).is_ok());
    }

    #[test]
    fn test_session_claims_jti_is_unique() {
        let subject = UserId::new();
        let a = SessionClaims::new(&subject, "iss", 1_000, 60);
        let b = SessionClaims::new(&subject, "iss", 1_000, 60);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_session_claims_debug_redacts_sub_and_jti() {
        let subject = UserId::new();
        let claims = SessionClaims::new(&subject, "parley-iam", 1_000, 60);
        let debug = format!("{claims:?}");

        assert!(!debug.contains(&claims.sub));
        assert!(!debug.contains(&claims.jti));
        assert!(debug.contains("parley-iam"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_session_claims_subject_parses() {
        let subject = UserId::new();
        let claims = SessionClaims::new(&subject, "iss", 1_000, 60);
        assert_eq!(claims.subject().unwrap(), subject);

        let mut bad = claims.clone();
        bad.sub = "not-a-uuid".to_string();
        assert_eq!(bad.subject(), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_session_claims_serialization_field_names() {
        let claims = SessionClaims::new(&UserId::new(), "iss", 10, 5);
        let json = serde_json::to_value(&claims).unwrap();

        for field in ["sub", "iss", "iat", "nbf", "exp", "jti"] {
            assert!(json.get(field).is_some(), "missing claim {field}");
        }
    }

    #[test]
    fn test_error_messages_are_uniform() {
        let messages: Vec<String> = [
            JwtValidationError::TokenTooLarge,
            JwtValidationError::MalformedToken,
            JwtValidationError::IatTooFarInFuture,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        assert!(messages.iter().all(|m| m == "The access token is invalid or expired"));
    }
}
