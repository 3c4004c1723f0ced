//! In-memory stores.
//!
//! Each store keeps its records behind a single `tokio::sync::RwLock`, so
//! uniqueness checks and the write that follows them happen under one
//! write guard. That makes upsert, rotate and revoke atomic with respect
//! to each other.

use super::{
    SessionStore, UserStore, CONTACT_CONFLICT, TOKEN_HASH_CONFLICT, USERNAME_CONFLICT,
};
use crate::errors::IamError;
use crate::models::{
    LookupField, Page, SessionGrant, SessionRecord, UserRecord, AUTH_PROVIDER_JWT,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::UserId;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Check `candidate` against every other record's unique columns.
fn check_user_uniqueness<'a>(
    mut others: impl Iterator<Item = &'a UserRecord>,
    candidate: &UserRecord,
) -> Result<(), IamError> {
    others.try_for_each(|existing| {
        if existing.id == candidate.id {
            return Ok(());
        }
        if existing.username_hash == candidate.username_hash {
            return Err(IamError::Conflict(USERNAME_CONFLICT.to_string()));
        }
        if existing.email_hash == candidate.email_hash
            && existing.phone_hash == candidate.phone_hash
        {
            return Err(IamError::Conflict(CONTACT_CONFLICT.to_string()));
        }
        Ok(())
    })
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, record: UserRecord) -> Result<UserRecord, IamError> {
        let mut users = self.users.write().await;
        if users.contains_key(&record.id) {
            return Err(IamError::Conflict("User id already exists".to_string()));
        }
        check_user_uniqueness(users.values(), &record)?;
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, IamError> {
        Ok(self.users.read().await.get(id.as_uuid()).cloned())
    }

    async fn find_by_lookup(
        &self,
        field: LookupField,
        hash: &str,
    ) -> Result<Option<UserRecord>, IamError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|record| field.hash_of(record) == Some(hash))
            .cloned())
    }

    async fn list(&self, page: Page) -> Result<Vec<UserRecord>, IamError> {
        let users = self.users.read().await;
        let mut all: Vec<&UserRecord> = users.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(all
            .into_iter()
            .skip(offset)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, record: UserRecord) -> Result<UserRecord, IamError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&record.id) {
            return Err(IamError::NotFound("User not found".to_string()));
        }
        check_user_uniqueness(users.values(), &record)?;
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &UserId) -> Result<bool, IamError> {
        Ok(self.users.write().await.remove(id.as_uuid()).is_some())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn hash_taken_by_other(
    sessions: &HashMap<Uuid, SessionRecord>,
    user_id: &Uuid,
    hash: &str,
) -> bool {
    sessions
        .values()
        .any(|s| s.refresh_token_hash == hash && &s.user_id != user_id)
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn upsert_for_user(
        &self,
        user_id: &UserId,
        grant: SessionGrant,
    ) -> Result<SessionRecord, IamError> {
        let mut sessions = self.sessions.write().await;
        let key = *user_id.as_uuid();
        if hash_taken_by_other(&sessions, &key, &grant.refresh_token_hash) {
            return Err(IamError::Conflict(TOKEN_HASH_CONFLICT.to_string()));
        }

        let now = Utc::now();
        let record = match sessions.get(&key) {
            Some(existing) => SessionRecord {
                refresh_token_hash: grant.refresh_token_hash,
                is_active: true,
                expires_at: grant.expires_at,
                last_login_at: grant.last_login_at,
                updated_at: now,
                ..existing.clone()
            },
            None => SessionRecord {
                id: Uuid::new_v4(),
                user_id: key,
                refresh_token_hash: grant.refresh_token_hash,
                is_active: true,
                expires_at: grant.expires_at,
                auth_provider: AUTH_PROVIDER_JWT.to_string(),
                last_login_at: grant.last_login_at,
                created_at: now,
                updated_at: now,
            },
        };

        sessions.insert(key, record.clone());
        Ok(record)
    }

    async fn find_by_token_hash(&self, hash: &str) -> Result<Option<SessionRecord>, IamError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.refresh_token_hash == hash)
            .cloned())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<SessionRecord>, IamError> {
        Ok(self.sessions.read().await.get(user_id.as_uuid()).cloned())
    }

    async fn rotate(
        &self,
        user_id: &UserId,
        expected_hash: &str,
        grant: SessionGrant,
        now: DateTime<Utc>,
    ) -> Result<bool, IamError> {
        let mut sessions = self.sessions.write().await;
        let key = *user_id.as_uuid();
        if hash_taken_by_other(&sessions, &key, &grant.refresh_token_hash) {
            return Err(IamError::Conflict(TOKEN_HASH_CONFLICT.to_string()));
        }

        let Some(record) = sessions.get_mut(&key) else {
            return Ok(false);
        };
        if record.refresh_token_hash != expected_hash || !record.is_live_at(now) {
            return Ok(false);
        }

        record.refresh_token_hash = grant.refresh_token_hash;
        record.expires_at = grant.expires_at;
        record.last_login_at = grant.last_login_at;
        record.updated_at = now;
        Ok(true)
    }

    async fn revoke(
        &self,
        user_id: &UserId,
        expected_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, IamError> {
        let mut sessions = self.sessions.write().await;
        let Some(record) = sessions.get_mut(user_id.as_uuid()) else {
            return Ok(false);
        };
        if record.refresh_token_hash != expected_hash || !record.is_active {
            return Ok(false);
        }

        record.is_active = false;
        record.expires_at = at;
        record.updated_at = at;
        Ok(true)
    }

    async fn delete_for_user(&self, user_id: &UserId) -> Result<bool, IamError> {
        Ok(self
            .sessions
            .write()
            .await
            .remove(user_id.as_uuid())
            .is_some())
    }
}
