//! Deterministic key material for testing.
//!
//! Every secret is a fixed byte pattern so tokens and search keys are
//! reproducible across runs. None of these values may be used outside tests.

use iam_service::config::Config;
use std::collections::HashMap;

/// Byte patterns behind each test secret.
pub const TEST_FIELD_KEY_BYTE: u8 = 0x11;
pub const TEST_SEARCH_KEY_BYTE: u8 = 0x22;
pub const TEST_ACCESS_SECRET_BYTE: u8 = 0x33;
pub const TEST_REFRESH_SECRET_BYTE: u8 = 0x44;

/// Issuer configured on the test server.
pub const TEST_ISSUER: &str = "parley-iam-test";

/// Lowest bcrypt cost the service accepts; keeps E2E tests fast.
pub const TEST_BCRYPT_COST: u32 = 10;

/// 32-byte AES-256 field key.
pub fn test_field_key() -> Vec<u8> {
    vec![TEST_FIELD_KEY_BYTE; 32]
}

/// 32-byte HMAC search-key secret.
pub fn test_search_key_secret() -> Vec<u8> {
    vec![TEST_SEARCH_KEY_BYTE; 32]
}

/// Access token signing secret. Forge access tokens with this.
pub fn test_access_secret() -> Vec<u8> {
    vec![TEST_ACCESS_SECRET_BYTE; 32]
}

/// Refresh token signing secret. Forge refresh tokens with this.
pub fn test_refresh_secret() -> Vec<u8> {
    vec![TEST_REFRESH_SECRET_BYTE; 32]
}

/// Environment variables that load a valid in-memory configuration.
pub fn test_vars() -> HashMap<String, String> {
    HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("FIELD_ENCRYPTION_KEY".to_string(), hex::encode(test_field_key())),
        (
            "SEARCH_KEY_SECRET".to_string(),
            hex::encode(test_search_key_secret()),
        ),
        (
            "JWT_ACCESS_SECRET".to_string(),
            hex::encode(test_access_secret()),
        ),
        (
            "JWT_REFRESH_SECRET".to_string(),
            hex::encode(test_refresh_secret()),
        ),
        ("JWT_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("BCRYPT_COST".to_string(), TEST_BCRYPT_COST.to_string()),
    ])
}

/// Configuration built from [`test_vars`].
///
/// # Panics
/// If the fixtures stop satisfying the config validation rules.
pub fn test_config() -> Config {
    Config::from_vars(&test_vars()).expect("test fixtures must form a valid config")
}
