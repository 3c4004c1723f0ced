//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions over issued session tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    #[serde(default)]
    pub typ: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    pub nbf: i64,
    pub jti: String,
}

fn segment(token: &str, index: usize) -> Vec<u8> {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT is missing segment {}", index));
    URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {}: {}", index, e))
}

fn claims(token: &str) -> JwtClaims {
    serde_json::from_slice(&segment(token, 1)).expect("Failed to parse JWT claims")
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// tokens.access_token
///     .assert_valid_jwt()
///     .assert_for_subject(&user_id)
///     .assert_expires_in(900);
/// ```
pub trait TokenAssertions {
    /// Assert that the token is an HS256 JWT carrying every session claim
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert that the token is for the specified subject
    fn assert_for_subject(&self, subject: &str) -> &Self;

    fn assert_issued_by(&self, issuer: &str) -> &Self;

    /// Assert that the token expires within the specified seconds (5 second tolerance)
    fn assert_expires_in(&self, seconds: i64) -> &Self;

    /// Assert that two tokens carry different token IDs
    fn assert_distinct_from(&self, other: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts = self.split('.').count();
        assert_eq!(
            parts, 3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts
        );

        let header: JwtHeader =
            serde_json::from_slice(&segment(self, 0)).expect("Failed to parse JWT header");
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");
        assert_eq!(header.typ.as_deref(), Some("JWT"), "Expected JWT type");

        let claims = claims(self);
        assert!(!claims.jti.is_empty(), "JWT must carry a token ID");
        assert!(claims.exp > claims.nbf, "JWT must expire after it becomes valid");

        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.sub, subject,
            "Expected subject '{}', got '{}'",
            subject, claims.sub
        );
        self
    }

    fn assert_issued_by(&self, issuer: &str) -> &Self {
        let claims = claims(self);
        assert_eq!(
            claims.iss, issuer,
            "Expected issuer '{}', got '{}'",
            issuer, claims.iss
        );
        self
    }

    fn assert_expires_in(&self, seconds: i64) -> &Self {
        let expires_in = claims(self).exp - chrono::Utc::now().timestamp();
        assert!(
            (expires_in - seconds).abs() <= 5,
            "Expected token to expire in {} seconds, but expires in {} seconds",
            seconds,
            expires_in
        );
        self
    }

    fn assert_distinct_from(&self, other: &str) -> &Self {
        assert_ne!(
            claims(self).jti,
            claims(other).jti,
            "Expected tokens with different IDs"
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_builders::TestClaimsBuilder;

    #[test]
    fn test_assert_valid_jwt_with_forged_token() {
        let token = TestClaimsBuilder::new().sign_access();
        token.assert_valid_jwt();
    }

    #[test]
    #[should_panic(expected = "JWT must have 3 parts")]
    fn test_assert_valid_jwt_with_invalid_structure() {
        let token = "invalid.token".to_string();
        token.assert_valid_jwt();
    }

    #[test]
    #[should_panic(expected = "Expected HS256 algorithm")]
    fn test_assert_valid_jwt_rejects_other_algorithms() {
        let header = r#"{"alg":"none","typ":"JWT"}"#;
        let payload = r#"{"sub":"x","iss":"y","exp":2,"nbf":1,"iat":1,"jti":"z"}"#;
        let token = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header.as_bytes()),
            URL_SAFE_NO_PAD.encode(payload.as_bytes())
        );
        token.assert_valid_jwt();
    }

    #[test]
    fn test_assert_subject_and_issuer() {
        let token = TestClaimsBuilder::new()
            .for_subject("user-123")
            .issued_by("issuer-a")
            .expires_in(600)
            .sign_refresh();

        token
            .assert_for_subject("user-123")
            .assert_issued_by("issuer-a")
            .assert_expires_in(600);
    }

    #[test]
    fn test_assert_distinct_from() {
        let a = TestClaimsBuilder::new().sign_access();
        let b = TestClaimsBuilder::new().sign_access();
        a.assert_distinct_from(&b);
    }
}
