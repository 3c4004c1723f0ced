//! Builder patterns for test data construction
//!
//! Provides fluent APIs for forging session tokens and building request bodies.

use crate::crypto_fixtures::{test_access_secret, test_refresh_secret, TEST_ISSUER};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

/// Builder for forged session claims.
///
/// Tokens are signed directly with `jsonwebtoken`, bypassing the service, so
/// tests can produce expired, wrongly issued or wrongly signed tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestClaimsBuilder::new()
///     .for_subject(&TEST_USER_ALICE.to_string())
///     .expired_seconds_ago(60)
///     .sign_access();
/// ```
pub struct TestClaimsBuilder {
    sub: String,
    iss: String,
    iat: i64,
    nbf: i64,
    exp: i64,
    jti: String,
}

impl TestClaimsBuilder {
    /// Claims for a random subject, issued now, valid for 15 minutes.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: Uuid::new_v4().to_string(),
            iss: TEST_ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::seconds(900)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set expiration in seconds from now
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Issued an hour before it expired, `seconds` ago.
    pub fn expired_seconds_ago(mut self, seconds: i64) -> Self {
        let exp = Utc::now().timestamp() - seconds;
        self.exp = exp;
        self.iat = exp - 3600;
        self.nbf = self.iat;
        self
    }

    /// Set issued-at (and not-before) timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self.nbf = timestamp;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(&self) -> Value {
        json!({
            "sub": self.sub,
            "iss": self.iss,
            "iat": self.iat,
            "nbf": self.nbf,
            "exp": self.exp,
            "jti": self.jti,
        })
    }

    /// Sign as HS256 with an arbitrary secret.
    pub fn sign_with(&self, secret: &[u8]) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        encode(&header, &self.build(), &EncodingKey::from_secret(secret))
            .expect("HS256 signing with a byte secret cannot fail")
    }

    /// Sign with the test server's access secret.
    pub fn sign_access(&self) -> String {
        self.sign_with(&test_access_secret())
    }

    /// Sign with the test server's refresh secret.
    pub fn sign_refresh(&self) -> String {
        self.sign_with(&test_refresh_secret())
    }
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `POST /api/v1/auth/register` bodies.
pub struct TestRegistrationBuilder {
    username: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl TestRegistrationBuilder {
    pub fn new(password: &str) -> Self {
        Self {
            username: None,
            email: None,
            phone_number: None,
            password: password.to_string(),
            first_name: None,
            last_name: None,
        }
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone_number = Some(phone.to_string());
        self
    }

    pub fn with_name(mut self, first: &str, last: &str) -> Self {
        self.first_name = Some(first.to_string());
        self.last_name = Some(last.to_string());
        self
    }

    pub fn build(self) -> Value {
        json!({
            "username": self.username,
            "email": self.email,
            "phone_number": self.phone_number,
            "password": self.password,
            "first_name": self.first_name,
            "last_name": self.last_name,
        })
    }
}
