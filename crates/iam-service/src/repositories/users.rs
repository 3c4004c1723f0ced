//! Postgres user store.
//!
//! Only hashed and encrypted columns are stored. Lookups match on the
//! `*_hash` columns; the service layer decrypts after loading.

use super::{UserStore, CONTACT_CONFLICT, USERNAME_CONFLICT};
use crate::errors::IamError;
use crate::models::{LookupField, Page, UserRecord};
use async_trait::async_trait;
use common::types::UserId;
use sqlx::PgPool;

const USER_COLUMNS: &str = r#"
    id, username_encrypted, username_hash,
    email_encrypted, email_hash, phone_encrypted, phone_hash,
    first_name_encrypted, last_name_encrypted, bio_encrypted,
    profile_picture_url_encrypted, user_type, status,
    language_preference, timezone, country, password_hash,
    created_at, updated_at
"#;

/// Map a write failure, turning unique violations into `Conflict`.
fn map_write_error(context: &str, e: sqlx::Error) -> IamError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some("users_username_hash_key") => {
                    IamError::Conflict(USERNAME_CONFLICT.to_string())
                }
                Some("users_email_phone_hash_key") => {
                    IamError::Conflict(CONTACT_CONFLICT.to_string())
                }
                _ => IamError::Conflict("User already exists".to_string()),
            };
        }
    }
    IamError::Database(format!("{context}: {e}"))
}

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, record: UserRecord) -> Result<UserRecord, IamError> {
        let query = format!(
            r#"
            INSERT INTO users (
                id, username_encrypted, username_hash,
                email_encrypted, email_hash, phone_encrypted, phone_hash,
                first_name_encrypted, last_name_encrypted, bio_encrypted,
                profile_picture_url_encrypted, user_type, status,
                language_preference, timezone, country, password_hash,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(record.id)
            .bind(&record.username_encrypted)
            .bind(&record.username_hash)
            .bind(&record.email_encrypted)
            .bind(&record.email_hash)
            .bind(&record.phone_encrypted)
            .bind(&record.phone_hash)
            .bind(&record.first_name_encrypted)
            .bind(&record.last_name_encrypted)
            .bind(&record.bio_encrypted)
            .bind(&record.profile_picture_url_encrypted)
            .bind(&record.user_type)
            .bind(&record.status)
            .bind(&record.language_preference)
            .bind(&record.timezone)
            .bind(&record.country)
            .bind(&record.password_hash)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error("Failed to create user", e))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, IamError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, UserRecord>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IamError::Database(format!("Failed to fetch user by id: {e}")))?;

        Ok(user)
    }

    async fn find_by_lookup(
        &self,
        field: LookupField,
        hash: &str,
    ) -> Result<Option<UserRecord>, IamError> {
        // Column names come from a closed enum, never from input
        let column = match field {
            LookupField::Username => "username_hash",
            LookupField::Email => "email_hash",
            LookupField::Phone => "phone_hash",
        };
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 LIMIT 1");

        let user = sqlx::query_as::<_, UserRecord>(&query)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                IamError::Database(format!("Failed to fetch user by {}: {e}", field.as_str()))
            })?;

        Ok(user)
    }

    async fn list(&self, page: Page) -> Result<Vec<UserRecord>, IamError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT $1 OFFSET $2"
        );
        let offset = i64::try_from(page.offset())
            .map_err(|_| IamError::Validation("Page is out of range".to_string()))?;

        let users = sqlx::query_as::<_, UserRecord>(&query)
            .bind(i64::from(page.limit()))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IamError::Database(format!("Failed to list users: {e}")))?;

        Ok(users)
    }

    async fn update(&self, record: UserRecord) -> Result<UserRecord, IamError> {
        let query = format!(
            r#"
            UPDATE users SET
                username_encrypted = $2, username_hash = $3,
                email_encrypted = $4, email_hash = $5,
                phone_encrypted = $6, phone_hash = $7,
                first_name_encrypted = $8, last_name_encrypted = $9,
                bio_encrypted = $10, profile_picture_url_encrypted = $11,
                user_type = $12, status = $13,
                language_preference = $14, timezone = $15, country = $16,
                password_hash = $17, updated_at = $18
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(record.id)
            .bind(&record.username_encrypted)
            .bind(&record.username_hash)
            .bind(&record.email_encrypted)
            .bind(&record.email_hash)
            .bind(&record.phone_encrypted)
            .bind(&record.phone_hash)
            .bind(&record.first_name_encrypted)
            .bind(&record.last_name_encrypted)
            .bind(&record.bio_encrypted)
            .bind(&record.profile_picture_url_encrypted)
            .bind(&record.user_type)
            .bind(&record.status)
            .bind(&record.language_preference)
            .bind(&record.timezone)
            .bind(&record.country)
            .bind(&record.password_hash)
            .bind(record.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error("Failed to update user", e))?
            .ok_or_else(|| IamError::NotFound("User not found".to_string()))
    }

    async fn delete(&self, id: &UserId) -> Result<bool, IamError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| IamError::Database(format!("Failed to delete user: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}
