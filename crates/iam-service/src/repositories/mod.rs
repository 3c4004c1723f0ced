//! Credential store abstraction.
//!
//! The identity core only talks to these traits. Two backends exist:
//! [`memory`] (embedded and test use) and the Postgres stores in [`users`]
//! and [`sessions`]. Both enforce the same uniqueness rules:
//!
//! - users: `username_hash`, and the `(email_hash, phone_hash)` pair with
//!   absent values comparing equal
//! - sessions: one record per `user_id`, and `refresh_token_hash`
//!
//! Uniqueness violations surface as `IamError::Conflict`. Store calls carry
//! no deadline of their own; callers wrap them in `tokio::time::timeout`.

pub mod memory;
pub mod sessions;
pub mod users;

use crate::errors::IamError;
use crate::models::{LookupField, Page, SessionGrant, SessionRecord, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::UserId;

pub use memory::{MemorySessionStore, MemoryUserStore};
pub use sessions::PgSessionStore;
pub use users::PgUserStore;

pub(crate) const USERNAME_CONFLICT: &str = "Username is already taken";
pub(crate) const CONTACT_CONFLICT: &str = "An account with this email or phone number already exists";
pub(crate) const TOKEN_HASH_CONFLICT: &str = "Refresh token hash already in use";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, record: UserRecord) -> Result<UserRecord, IamError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, IamError>;

    /// Match `hash` against the hashed column named by `field`.
    async fn find_by_lookup(
        &self,
        field: LookupField,
        hash: &str,
    ) -> Result<Option<UserRecord>, IamError>;

    /// Users ordered by creation time.
    async fn list(&self, page: Page) -> Result<Vec<UserRecord>, IamError>;

    /// Replace the stored record with the same id.
    ///
    /// Returns `NotFound` if no such record exists.
    async fn update(&self, record: UserRecord) -> Result<UserRecord, IamError>;

    /// Returns whether a record was deleted.
    async fn delete(&self, id: &UserId) -> Result<bool, IamError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Atomically create or overwrite the session record for `user_id`.
    ///
    /// The record becomes active with the grant's hash, expiry and last-login.
    async fn upsert_for_user(
        &self,
        user_id: &UserId,
        grant: SessionGrant,
    ) -> Result<SessionRecord, IamError>;

    async fn find_by_token_hash(&self, hash: &str) -> Result<Option<SessionRecord>, IamError>;

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<SessionRecord>, IamError>;

    /// Compare-and-swap the rotation fields.
    ///
    /// Applies only if the record for `user_id` still holds `expected_hash`,
    /// is active and has not expired at `now`. Returns whether it applied.
    async fn rotate(
        &self,
        user_id: &UserId,
        expected_hash: &str,
        grant: SessionGrant,
        now: DateTime<Utc>,
    ) -> Result<bool, IamError>;

    /// Soft revoke: `is_active = false`, `expires_at = at`.
    ///
    /// Applies only if the record still holds `expected_hash` and is active.
    async fn revoke(
        &self,
        user_id: &UserId,
        expected_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, IamError>;

    /// Hard delete. Returns whether a record existed.
    async fn delete_for_user(&self, user_id: &UserId) -> Result<bool, IamError>;
}
