use common::jwt::MAX_CLOCK_SKEW;
use common::secret::{clone_secret_bytes, secret_bytes, SecretBytes};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default access token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 900;

/// Default refresh token base lifetime (1 day), scaled by the days multiplier.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 86_400;

/// Default refresh token days multiplier.
pub const DEFAULT_REFRESH_TOKEN_DAYS_MULTIPLIER: i64 = 7;

/// Default JWT clock skew tolerance in seconds.
pub const DEFAULT_JWT_CLOCK_SKEW_SECONDS: i64 = 0;

/// Default token issuer.
pub const DEFAULT_JWT_ISSUER: &str = "parley-iam";

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted bcrypt cost factor.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum accepted bcrypt cost factor.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Minimum length of the search-key and token signing secrets (SHA-256 output size).
pub const MIN_MAC_SECRET_BYTES: usize = 32;

/// Field cipher key lengths supported by AES-GCM (AES-128, AES-256).
pub const FIELD_KEY_LENGTHS: [usize; 2] = [16, 32];

pub struct Config {
    /// Postgres connection string. When absent the service runs on in-memory stores.
    pub database_url: Option<String>,
    pub bind_address: String,
    pub field_encryption_key: SecretBytes,
    pub search_key_secret: SecretBytes,
    pub jwt_access_secret: SecretBytes,
    pub jwt_refresh_secret: SecretBytes,
    pub jwt_issuer: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub refresh_token_days_multiplier: i64,
    pub jwt_clock_skew_seconds: i64,
    pub bcrypt_cost: u32,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            database_url: self.database_url.clone(),
            bind_address: self.bind_address.clone(),
            field_encryption_key: clone_secret_bytes(&self.field_encryption_key),
            search_key_secret: clone_secret_bytes(&self.search_key_secret),
            jwt_access_secret: clone_secret_bytes(&self.jwt_access_secret),
            jwt_refresh_secret: clone_secret_bytes(&self.jwt_refresh_secret),
            jwt_issuer: self.jwt_issuer.clone(),
            access_token_ttl_seconds: self.access_token_ttl_seconds,
            refresh_token_ttl_seconds: self.refresh_token_ttl_seconds,
            refresh_token_days_multiplier: self.refresh_token_days_multiplier,
            jwt_clock_skew_seconds: self.jwt_clock_skew_seconds,
            bcrypt_cost: self.bcrypt_cost,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("bind_address", &self.bind_address)
            .field("field_encryption_key", &"[REDACTED]")
            .field("search_key_secret", &"[REDACTED]")
            .field("jwt_access_secret", &"[REDACTED]")
            .field("jwt_refresh_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field(
                "refresh_token_days_multiplier",
                &self.refresh_token_days_multiplier,
            )
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid secret {name}: {reason}")]
    InvalidSecret { name: String, reason: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .cloned();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let field_encryption_key = decode_hex_secret(vars, "FIELD_ENCRYPTION_KEY")?;
        if !FIELD_KEY_LENGTHS.contains(&field_encryption_key.len()) {
            return Err(ConfigError::InvalidSecret {
                name: "FIELD_ENCRYPTION_KEY".to_string(),
                reason: format!(
                    "expected 16 or 32 bytes, got {}",
                    field_encryption_key.len()
                ),
            });
        }

        let search_key_secret = decode_mac_secret(vars, "SEARCH_KEY_SECRET")?;
        let jwt_access_secret = decode_mac_secret(vars, "JWT_ACCESS_SECRET")?;
        let jwt_refresh_secret = decode_mac_secret(vars, "JWT_REFRESH_SECRET")?;

        let jwt_issuer = vars
            .get("JWT_ISSUER")
            .filter(|iss| !iss.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string());

        let access_token_ttl_seconds = parse_positive(
            vars,
            "JWT_ACCESS_TOKEN_TTL_SECONDS",
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
        )?;
        let refresh_token_ttl_seconds = parse_positive(
            vars,
            "JWT_REFRESH_TOKEN_TTL_SECONDS",
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
        )?;
        let refresh_token_days_multiplier = parse_positive(
            vars,
            "JWT_REFRESH_TOKEN_DAYS_MULTIPLIER",
            DEFAULT_REFRESH_TOKEN_DAYS_MULTIPLIER,
        )?;
        if refresh_token_ttl_seconds
            .checked_mul(refresh_token_days_multiplier)
            .is_none()
        {
            return Err(ConfigError::InvalidValue {
                name: "JWT_REFRESH_TOKEN_DAYS_MULTIPLIER".to_string(),
                reason: "refresh token lifetime overflows".to_string(),
            });
        }

        let jwt_clock_skew_seconds = match vars.get("JWT_CLOCK_SKEW_SECONDS") {
            Some(value) => {
                let skew: i64 = value.parse().map_err(|e| ConfigError::InvalidValue {
                    name: "JWT_CLOCK_SKEW_SECONDS".to_string(),
                    reason: format!("not an integer: {}", e),
                })?;
                let max = MAX_CLOCK_SKEW.as_secs() as i64;
                if !(0..=max).contains(&skew) {
                    return Err(ConfigError::InvalidValue {
                        name: "JWT_CLOCK_SKEW_SECONDS".to_string(),
                        reason: format!("must be between 0 and {}, got {}", max, skew),
                    });
                }
                skew
            }
            None => DEFAULT_JWT_CLOCK_SKEW_SECONDS,
        };

        let bcrypt_cost = match vars.get("BCRYPT_COST") {
            Some(value) => {
                let cost: u32 = value.parse().map_err(|e| ConfigError::InvalidValue {
                    name: "BCRYPT_COST".to_string(),
                    reason: format!("not an integer: {}", e),
                })?;
                if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
                    return Err(ConfigError::InvalidValue {
                        name: "BCRYPT_COST".to_string(),
                        reason: format!(
                            "must be between {} and {}, got {}",
                            MIN_BCRYPT_COST, MAX_BCRYPT_COST, cost
                        ),
                    });
                }
                cost
            }
            None => DEFAULT_BCRYPT_COST,
        };

        Ok(Config {
            database_url,
            bind_address,
            field_encryption_key: secret_bytes(field_encryption_key),
            search_key_secret: secret_bytes(search_key_secret),
            jwt_access_secret: secret_bytes(jwt_access_secret),
            jwt_refresh_secret: secret_bytes(jwt_refresh_secret),
            jwt_issuer,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            refresh_token_days_multiplier,
            jwt_clock_skew_seconds,
            bcrypt_cost,
        })
    }

    /// Effective refresh token lifetime: base TTL times the days multiplier.
    pub fn refresh_token_lifetime_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
            .saturating_mul(self.refresh_token_days_multiplier)
    }
}

fn decode_hex_secret(vars: &HashMap<String, String>, name: &str) -> Result<Vec<u8>, ConfigError> {
    let raw = vars
        .get(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?;

    hex::decode(raw.trim()).map_err(|e| ConfigError::InvalidSecret {
        name: name.to_string(),
        reason: format!("not valid hex: {}", e),
    })
}

fn decode_mac_secret(vars: &HashMap<String, String>, name: &str) -> Result<Vec<u8>, ConfigError> {
    let bytes = decode_hex_secret(vars, name)?;
    if bytes.len() < MIN_MAC_SECRET_BYTES {
        return Err(ConfigError::InvalidSecret {
            name: name.to_string(),
            reason: format!(
                "expected at least {} bytes, got {}",
                MIN_MAC_SECRET_BYTES,
                bytes.len()
            ),
        });
    }
    Ok(bytes)
}

fn parse_positive(
    vars: &HashMap<String, String>,
    name: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    let Some(value) = vars.get(name) else {
        return Ok(default);
    };
    let parsed: i64 = value.parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("not an integer: {}", e),
    })?;
    if parsed <= 0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("must be positive, got {}", parsed),
        });
    }
    Ok(parsed)
}
