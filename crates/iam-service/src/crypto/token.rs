//! Access/refresh token codec.
//!
//! Both token kinds are HS256 JWTs carrying [`SessionClaims`]. They are
//! signed with independent secrets and have independent lifetimes, so a
//! leaked access secret cannot mint refresh tokens and vice versa.
//!
//! Verification pins the algorithm to HS256. A token whose header names any
//! other algorithm (RS256, EdDSA, `none`) is rejected before its signature is
//! looked at.

use crate::config::{Config, MIN_MAC_SECRET_BYTES};
use crate::errors::IamError;
use crate::observability::metrics::{record_token_issuance, record_token_validation};
use common::jwt::{check_size, validate_iat, SessionClaims};
use common::secret::ExposeSecret;
use common::types::UserId;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tracing::instrument;

/// Signs and verifies bearer tokens.
pub trait TokenCodec: Send + Sync {
    fn generate_access_token(&self, subject: &UserId) -> Result<String, IamError>;

    fn generate_refresh_token(&self, subject: &UserId) -> Result<String, IamError>;

    /// Verify an access token and return its claims.
    fn verify_access_token(&self, token: &str) -> Result<SessionClaims, IamError>;

    /// Verify a refresh token's signature, issuer and time window and return its claims.
    fn decode_refresh_token(&self, token: &str) -> Result<SessionClaims, IamError>;

    /// Whether a refresh token's signature and time window are valid.
    fn verify_refresh_token(&self, token: &str) -> bool {
        self.decode_refresh_token(token).is_ok()
    }

    fn access_token_ttl(&self) -> chrono::Duration;

    fn refresh_token_ttl(&self) -> chrono::Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    fn invalid(&self) -> IamError {
        match self {
            TokenKind::Access => IamError::invalid_access_token(),
            TokenKind::Refresh => IamError::invalid_refresh_token(),
        }
    }
}

/// Construction parameters for [`JwtTokenCodec`].
pub struct TokenCodecSettings<'a> {
    pub access_secret: &'a [u8],
    pub refresh_secret: &'a [u8],
    pub issuer: &'a str,
    pub access_ttl_seconds: i64,
    /// Effective refresh lifetime, with any days multiplier already applied.
    pub refresh_ttl_seconds: i64,
    pub clock_skew: StdDuration,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(name: &str, secret: &[u8]) -> Result<Self, IamError> {
        if secret.len() < MIN_MAC_SECRET_BYTES {
            return Err(IamError::Validation(format!(
                "{} signing secret must be at least {} bytes, got {}",
                name,
                MIN_MAC_SECRET_BYTES,
                secret.len()
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }
}

/// HS256 implementation of [`TokenCodec`] on `jsonwebtoken`.
pub struct JwtTokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    clock_skew: StdDuration,
}

impl fmt::Debug for JwtTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtTokenCodec")
            .field("access_secret", &"[REDACTED]")
            .field("refresh_secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl JwtTokenCodec {
    pub fn new(settings: TokenCodecSettings<'_>) -> Result<Self, IamError> {
        if settings.access_secret == settings.refresh_secret {
            return Err(IamError::Validation(
                "Access and refresh signing secrets must differ".to_string(),
            ));
        }
        if settings.access_ttl_seconds <= 0 || settings.refresh_ttl_seconds <= 0 {
            return Err(IamError::Validation(
                "Token lifetimes must be positive".to_string(),
            ));
        }
        if settings.clock_skew > common::jwt::MAX_CLOCK_SKEW {
            return Err(IamError::Validation(format!(
                "Clock skew {:?} exceeds maximum {:?}",
                settings.clock_skew,
                common::jwt::MAX_CLOCK_SKEW
            )));
        }

        Ok(Self {
            access: KeyPair::from_secret("Access", settings.access_secret)?,
            refresh: KeyPair::from_secret("Refresh", settings.refresh_secret)?,
            issuer: settings.issuer.to_string(),
            access_ttl_seconds: settings.access_ttl_seconds,
            refresh_ttl_seconds: settings.refresh_ttl_seconds,
            clock_skew: settings.clock_skew,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, IamError> {
        Self::new(TokenCodecSettings {
            access_secret: config.jwt_access_secret.expose_secret(),
            refresh_secret: config.jwt_refresh_secret.expose_secret(),
            issuer: &config.jwt_issuer,
            access_ttl_seconds: config.access_token_ttl_seconds,
            refresh_ttl_seconds: config.refresh_token_lifetime_seconds(),
            clock_skew: StdDuration::from_secs(config.jwt_clock_skew_seconds.unsigned_abs()),
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn ttl_seconds(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_seconds,
            TokenKind::Refresh => self.refresh_ttl_seconds,
        }
    }

    /// Mint a token as if issued at `iat` (Unix seconds).
    #[instrument(skip_all, fields(kind = kind.as_str()))]
    pub(crate) fn generate_at(
        &self,
        kind: TokenKind,
        subject: &UserId,
        iat: i64,
    ) -> Result<String, IamError> {
        let start = Instant::now();
        let claims = SessionClaims::new(subject, &self.issuer, iat, self.ttl_seconds(kind));

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());

        let result = encode(&header, &claims, &self.keys(kind).encoding)
            .map_err(|e| IamError::Crypto(format!("JWT signing operation failed: {}", e)));

        let status = if result.is_ok() { "success" } else { "error" };
        record_token_issuance(kind.as_str(), status, start.elapsed());
        result
    }

    #[instrument(skip_all, fields(kind = kind.as_str()))]
    fn verify(&self, kind: TokenKind, token: &str) -> Result<SessionClaims, IamError> {
        let reject = |reason: &'static str| {
            tracing::debug!(
                target: "iam.crypto",
                kind = kind.as_str(),
                reason,
                "Token rejected"
            );
            record_token_validation(kind.as_str(), "error", Some(reason));
            kind.invalid()
        };

        check_size(token).map_err(|e| reject(e.reason()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        let token_data = decode::<SessionClaims>(token, &self.keys(kind).decoding, &validation)
            .map_err(|e| {
                reject(match e.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::ImmatureSignature => "not_yet_valid",
                    ErrorKind::InvalidSignature => "signature",
                    ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => "algorithm",
                    ErrorKind::InvalidIssuer => "issuer",
                    ErrorKind::MissingRequiredClaim(_) => "missing_claim",
                    _ => "malformed",
                })
            })?;

        let claims = token_data.claims;
        validate_iat(claims.iat, self.clock_skew).map_err(|e| reject(e.reason()))?;
        claims.subject().map_err(|e| reject(e.reason()))?;

        record_token_validation(kind.as_str(), "success", None);
        Ok(claims)
    }
}

impl TokenCodec for JwtTokenCodec {
    fn generate_access_token(&self, subject: &UserId) -> Result<String, IamError> {
        self.generate_at(TokenKind::Access, subject, chrono::Utc::now().timestamp())
    }

    fn generate_refresh_token(&self, subject: &UserId) -> Result<String, IamError> {
        self.generate_at(TokenKind::Refresh, subject, chrono::Utc::now().timestamp())
    }

    fn verify_access_token(&self, token: &str) -> Result<SessionClaims, IamError> {
        self.verify(TokenKind::Access, token)
    }

    fn decode_refresh_token(&self, token: &str) -> Result<SessionClaims, IamError> {
        self.verify(TokenKind::Refresh, token)
    }

    fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_ttl_seconds)
    }

    fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_ttl_seconds)
    }
}
