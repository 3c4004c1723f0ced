use crate::errors::IamError;
use chrono::{DateTime, Utc};
use common::types::UserId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Regular,
    Enterprise,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Regular => "regular",
            UserType::Enterprise => "enterprise",
        }
    }
}

impl FromStr for UserType {
    type Err = IamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(UserType::Regular),
            "enterprise" => Ok(UserType::Enterprise),
            _ => Err(IamError::Validation(format!("Invalid user type: {}", s))),
        }
    }
}

/// Presence status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    #[default]
    Offline,
    Busy,
    Away,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Online => "online",
            UserStatus::Offline => "offline",
            UserStatus::Busy => "busy",
            UserStatus::Away => "away",
        }
    }
}

impl FromStr for UserStatus {
    type Err = IamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(UserStatus::Online),
            "offline" => Ok(UserStatus::Offline),
            "busy" => Ok(UserStatus::Busy),
            "away" => Ok(UserStatus::Away),
            _ => Err(IamError::Validation(format!("Invalid user status: {}", s))),
        }
    }
}

/// Parse a user ID from untrusted input.
pub fn parse_user_id(raw: &str) -> Result<UserId, IamError> {
    raw.parse()
        .map_err(|_| IamError::Validation("Invalid user id".to_string()))
}

/// A user as callers see it: every attribute in plaintext.
///
/// The password hash is not part of this view.
#[derive(Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    pub user_type: UserType,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Only non-PII fields are printed.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("user_type", &self.user_type)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Input to `IdentityDirectory::create`.
#[derive(Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Bcrypt hash; plaintext passwords never reach the directory.
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub user_type: UserType,
    pub language_preference: Option<String>,
    pub timezone: Option<String>,
    pub country: Option<String>,
}

/// Partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub status: Option<UserStatus>,
    pub language_preference: Option<String>,
    pub timezone: Option<String>,
    pub country: Option<String>,
}

/// The stored shape of a user (maps to users table).
///
/// Lookup attributes appear twice: `*_encrypted` for recovery and `*_hash`
/// for equality lookups. Free-text PII is only encrypted.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username_encrypted: String,
    pub username_hash: String,
    pub email_encrypted: Option<String>,
    pub email_hash: Option<String>,
    pub phone_encrypted: Option<String>,
    pub phone_hash: Option<String>,
    pub first_name_encrypted: Option<String>,
    pub last_name_encrypted: Option<String>,
    pub bio_encrypted: Option<String>,
    pub profile_picture_url_encrypted: Option<String>,
    pub user_type: String,
    pub status: String,
    pub language_preference: Option<String>,
    pub timezone: Option<String>,
    pub country: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which hashed lookup column to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupField {
    Username,
    Email,
    Phone,
}

impl LookupField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupField::Username => "username",
            LookupField::Email => "email",
            LookupField::Phone => "phone",
        }
    }

    /// The value of this lookup column on a stored record.
    pub fn hash_of<'a>(&self, record: &'a UserRecord) -> Option<&'a str> {
        match self {
            LookupField::Username => Some(record.username_hash.as_str()),
            LookupField::Email => record.email_hash.as_deref(),
            LookupField::Phone => record.phone_hash.as_deref(),
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// One-based pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Result<Self, IamError> {
        if page == 0 {
            return Err(IamError::Validation("page must be at least 1".to_string()));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(IamError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Authentication provider recorded on session records.
pub const AUTH_PROVIDER_JWT: &str = "jwt";

/// Per-user session record (maps to sessions table).
///
/// Holds the hash of the current refresh token, never the token itself.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub auth_provider: String,
    pub last_login_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Active and not yet expired at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Rotation fields written on issue and rotate.
#[derive(Clone, PartialEq)]
pub struct SessionGrant {
    pub refresh_token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGrant")
            .field("refresh_token_hash", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("last_login_at", &self.last_login_at)
            .finish()
    }
}

/// Access/refresh token pair returned on login and rotation.
#[derive(Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in,
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
