//! Postgres session store.
//!
//! `sessions.user_id` is unique, so a subject holds at most one record.
//! Rotation and revocation are conditional `UPDATE`s keyed on the expected
//! refresh-token hash; the row lock taken by the update makes them
//! compare-and-swap operations.

use super::{SessionStore, TOKEN_HASH_CONFLICT};
use crate::errors::IamError;
use crate::models::{SessionGrant, SessionRecord, AUTH_PROVIDER_JWT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::UserId;
use sqlx::PgPool;
use uuid::Uuid;

const SESSION_COLUMNS: &str = r#"
    id, user_id, refresh_token_hash, is_active, expires_at,
    auth_provider, last_login_at, created_at, updated_at
"#;

fn map_write_error(context: &str, e: sqlx::Error) -> IamError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return IamError::Conflict(TOKEN_HASH_CONFLICT.to_string());
        }
    }
    IamError::Database(format!("{context}: {e}"))
}

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn upsert_for_user(
        &self,
        user_id: &UserId,
        grant: SessionGrant,
    ) -> Result<SessionRecord, IamError> {
        let query = format!(
            r#"
            INSERT INTO sessions (
                id, user_id, refresh_token_hash, is_active, expires_at,
                auth_provider, last_login_at
            )
            VALUES ($1, $2, $3, TRUE, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                refresh_token_hash = EXCLUDED.refresh_token_hash,
                is_active = TRUE,
                expires_at = EXCLUDED.expires_at,
                last_login_at = EXCLUDED.last_login_at,
                updated_at = NOW()
            RETURNING {SESSION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, SessionRecord>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id.as_uuid())
            .bind(&grant.refresh_token_hash)
            .bind(grant.expires_at)
            .bind(AUTH_PROVIDER_JWT)
            .bind(grant.last_login_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error("Failed to upsert session", e))
    }

    async fn find_by_token_hash(&self, hash: &str) -> Result<Option<SessionRecord>, IamError> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE refresh_token_hash = $1");
        let session = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IamError::Database(format!("Failed to fetch session: {e}")))?;

        Ok(session)
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<SessionRecord>, IamError> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1");
        let session = sqlx::query_as::<_, SessionRecord>(&query)
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IamError::Database(format!("Failed to fetch session for user: {e}")))?;

        Ok(session)
    }

    async fn rotate(
        &self,
        user_id: &UserId,
        expected_hash: &str,
        grant: SessionGrant,
        now: DateTime<Utc>,
    ) -> Result<bool, IamError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                refresh_token_hash = $3,
                expires_at = $4,
                last_login_at = $5,
                updated_at = $6
            WHERE user_id = $1
              AND refresh_token_hash = $2
              AND is_active
              AND expires_at > $6
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(expected_hash)
        .bind(&grant.refresh_token_hash)
        .bind(grant.expires_at)
        .bind(grant.last_login_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("Failed to rotate session", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke(
        &self,
        user_id: &UserId,
        expected_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, IamError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET is_active = FALSE, expires_at = $3, updated_at = $3
            WHERE user_id = $1 AND refresh_token_hash = $2 AND is_active
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(expected_hash)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| IamError::Database(format!("Failed to revoke session: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_for_user(&self, user_id: &UserId) -> Result<bool, IamError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| IamError::Database(format!("Failed to delete session: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
