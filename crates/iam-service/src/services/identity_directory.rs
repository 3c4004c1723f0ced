//! Identity directory.
//!
//! Applies the search-key hasher and field cipher around the user store so
//! callers only ever see plaintext users and the store only ever sees
//! ciphertext plus lookup hashes.
//!
//! Create and update follow a fixed order:
//!
//! 1. hash every lookup attribute present (username, email, phone)
//! 2. encrypt every sensitive attribute
//! 3. persist
//! 4. decrypt the persisted record for the caller

use crate::crypto::{password, FieldCipher, SearchKeyHasher};
use crate::errors::IamError;
use crate::models::{
    LookupField, NewUser, Page, User, UserRecord, UserStatus, UserType, UserUpdate,
};
use crate::observability::{hash_for_correlation, metrics};
use crate::repositories::UserStore;
use chrono::Utc;
use common::types::UserId;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

pub struct IdentityDirectory {
    store: Arc<dyn UserStore>,
    cipher: Arc<dyn FieldCipher>,
    hasher: Arc<dyn SearchKeyHasher>,
}

impl fmt::Debug for IdentityDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityDirectory").finish_non_exhaustive()
    }
}

/// Encrypted value and its lookup hash.
struct Protected {
    encrypted: String,
    hash: String,
}

fn observe<T>(operation: &str, start: Instant, result: &Result<T, IamError>) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_directory_operation(operation, status, start.elapsed());
}

fn not_found() -> IamError {
    IamError::NotFound("User not found".to_string())
}

/// Trim, and treat blank input as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl IdentityDirectory {
    pub fn new(
        store: Arc<dyn UserStore>,
        cipher: Arc<dyn FieldCipher>,
        hasher: Arc<dyn SearchKeyHasher>,
    ) -> Self {
        Self {
            store,
            cipher,
            hasher,
        }
    }

    fn protect(&self, value: &str) -> Result<Protected, IamError> {
        let hash = self.hasher.generate_search_key(value)?;
        let encrypted = self.cipher.encrypt(value)?;
        Ok(Protected { encrypted, hash })
    }

    fn protect_opt(&self, value: Option<&str>) -> Result<Option<Protected>, IamError> {
        value.map(|v| self.protect(v)).transpose()
    }

    fn encrypt_opt(&self, value: Option<&str>) -> Result<Option<String>, IamError> {
        value.map(|v| self.cipher.encrypt(v)).transpose()
    }

    fn decrypt_opt(&self, value: Option<&str>) -> Result<Option<String>, IamError> {
        value.map(|v| self.cipher.decrypt(v)).transpose()
    }

    fn to_user(&self, record: &UserRecord) -> Result<User, IamError> {
        let user_type: UserType = record
            .user_type
            .parse()
            .map_err(|_| IamError::Database("Stored user has an unknown user_type".to_string()))?;
        let status: UserStatus = record
            .status
            .parse()
            .map_err(|_| IamError::Database("Stored user has an unknown status".to_string()))?;

        Ok(User {
            id: UserId(record.id),
            username: self.cipher.decrypt(&record.username_encrypted)?,
            email: self.decrypt_opt(record.email_encrypted.as_deref())?,
            phone_number: self.decrypt_opt(record.phone_encrypted.as_deref())?,
            first_name: self.decrypt_opt(record.first_name_encrypted.as_deref())?,
            last_name: self.decrypt_opt(record.last_name_encrypted.as_deref())?,
            bio: self.decrypt_opt(record.bio_encrypted.as_deref())?,
            profile_picture_url: self.decrypt_opt(record.profile_picture_url_encrypted.as_deref())?,
            user_type,
            status,
            language_preference: record.language_preference.clone(),
            timezone: record.timezone.clone(),
            country: record.country.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Create a user.
    ///
    /// Requires a username and at least one of email or phone. Duplicate
    /// username, or a duplicate email/phone pair, is `Conflict`.
    #[instrument(skip_all)]
    pub async fn create(&self, new_user: NewUser) -> Result<User, IamError> {
        let start = Instant::now();
        let result = self.create_inner(new_user).await;
        observe("create", start, &result);
        result
    }

    async fn create_inner(&self, new_user: NewUser) -> Result<User, IamError> {
        let username = new_user.username.trim();
        if username.is_empty() {
            return Err(IamError::Validation("Username is required".to_string()));
        }
        let email = non_blank(new_user.email);
        let phone = non_blank(new_user.phone_number);
        if email.is_none() && phone.is_none() {
            return Err(IamError::Validation(
                "Either an email or a phone number is required".to_string(),
            ));
        }
        if new_user.password_hash.is_empty() {
            return Err(IamError::Validation("Password hash is required".to_string()));
        }

        let username = self.protect(username)?;
        let email = self.protect_opt(email.as_deref())?;
        let phone = self.protect_opt(phone.as_deref())?;

        let now = Utc::now();
        let (email_encrypted, email_hash) = split(email);
        let (phone_encrypted, phone_hash) = split(phone);
        let record = UserRecord {
            id: Uuid::new_v4(),
            username_encrypted: username.encrypted,
            username_hash: username.hash,
            email_encrypted,
            email_hash,
            phone_encrypted,
            phone_hash,
            first_name_encrypted: self.encrypt_opt(new_user.first_name.as_deref())?,
            last_name_encrypted: self.encrypt_opt(new_user.last_name.as_deref())?,
            bio_encrypted: self.encrypt_opt(new_user.bio.as_deref())?,
            profile_picture_url_encrypted: self
                .encrypt_opt(new_user.profile_picture_url.as_deref())?,
            user_type: new_user.user_type.as_str().to_string(),
            status: UserStatus::default().as_str().to_string(),
            language_preference: new_user.language_preference,
            timezone: new_user.timezone,
            country: new_user.country,
            password_hash: new_user.password_hash,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert(record).await?;
        tracing::info!(
            target: "iam.directory",
            user = %hash_for_correlation(&stored.id.to_string()),
            "User created"
        );
        self.to_user(&stored)
    }

    #[instrument(skip_all)]
    pub async fn get_by_id(&self, id: &UserId) -> Result<User, IamError> {
        let start = Instant::now();
        let result = match self.store.find_by_id(id).await {
            Ok(Some(record)) => self.to_user(&record),
            Ok(None) => Err(not_found()),
            Err(e) => Err(e),
        };
        observe("get_by_id", start, &result);
        result
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User, IamError> {
        self.get_by_lookup(LookupField::Username, username).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, IamError> {
        self.get_by_lookup(LookupField::Email, email).await
    }

    pub async fn get_by_phone(&self, phone: &str) -> Result<User, IamError> {
        self.get_by_lookup(LookupField::Phone, phone).await
    }

    async fn find_record(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Option<UserRecord>, IamError> {
        let hash = self.hasher.generate_search_key(value)?;
        self.store.find_by_lookup(field, &hash).await
    }

    #[instrument(skip_all, fields(field = field.as_str()))]
    async fn get_by_lookup(&self, field: LookupField, value: &str) -> Result<User, IamError> {
        let start = Instant::now();
        let result = match self.find_record(field, value).await {
            Ok(Some(record)) => self.to_user(&record),
            Ok(None) => Err(not_found()),
            Err(e) => Err(e),
        };
        observe("get_by_lookup", start, &result);
        result
    }

    #[instrument(skip_all)]
    pub async fn list(&self, page: Page) -> Result<Vec<User>, IamError> {
        let start = Instant::now();
        let result = match self.store.list(page).await {
            Ok(records) => records.iter().map(|r| self.to_user(r)).collect(),
            Err(e) => Err(e),
        };
        observe("list", start, &result);
        result
    }

    /// Apply a partial update. Changed lookup attributes are re-hashed.
    #[instrument(skip_all)]
    pub async fn update(&self, id: &UserId, changes: UserUpdate) -> Result<User, IamError> {
        let start = Instant::now();
        let result = self.update_inner(id, changes).await;
        observe("update", start, &result);
        result
    }

    async fn update_inner(&self, id: &UserId, changes: UserUpdate) -> Result<User, IamError> {
        let mut record = self.store.find_by_id(id).await?.ok_or_else(not_found)?;

        if let Some(username) = changes.username {
            let username = username.trim();
            if username.is_empty() {
                return Err(IamError::Validation("Username cannot be empty".to_string()));
            }
            let protected = self.protect(username)?;
            record.username_encrypted = protected.encrypted;
            record.username_hash = protected.hash;
        }
        if let Some(email) = changes.email {
            (record.email_encrypted, record.email_hash) =
                split(self.protect_opt(non_blank(Some(email)).as_deref())?);
        }
        if let Some(phone) = changes.phone_number {
            (record.phone_encrypted, record.phone_hash) =
                split(self.protect_opt(non_blank(Some(phone)).as_deref())?);
        }
        if record.email_hash.is_none() && record.phone_hash.is_none() {
            return Err(IamError::Validation(
                "Either an email or a phone number is required".to_string(),
            ));
        }

        if let Some(v) = changes.first_name {
            record.first_name_encrypted = Some(self.cipher.encrypt(&v)?);
        }
        if let Some(v) = changes.last_name {
            record.last_name_encrypted = Some(self.cipher.encrypt(&v)?);
        }
        if let Some(v) = changes.bio {
            record.bio_encrypted = Some(self.cipher.encrypt(&v)?);
        }
        if let Some(v) = changes.profile_picture_url {
            record.profile_picture_url_encrypted = Some(self.cipher.encrypt(&v)?);
        }
        if let Some(status) = changes.status {
            record.status = status.as_str().to_string();
        }
        if changes.language_preference.is_some() {
            record.language_preference = changes.language_preference;
        }
        if changes.timezone.is_some() {
            record.timezone = changes.timezone;
        }
        if changes.country.is_some() {
            record.country = changes.country;
        }
        record.updated_at = Utc::now();

        let stored = self.store.update(record).await?;
        self.to_user(&stored)
    }

    #[instrument(skip_all)]
    pub async fn delete(&self, id: &UserId) -> Result<(), IamError> {
        let start = Instant::now();
        let result = match self.store.delete(id).await {
            Ok(true) => {
                tracing::info!(
                    target: "iam.directory",
                    user = %hash_for_correlation(&id.to_string()),
                    "User deleted"
                );
                Ok(())
            }
            Ok(false) => Err(not_found()),
            Err(e) => Err(e),
        };
        observe("delete", start, &result);
        result
    }

    /// Check a password against the user named by `identifier`.
    ///
    /// `identifier` is tried as a username, then as an email. An unknown
    /// identifier still runs one bcrypt verification, so both failure paths
    /// cost about the same and return the same error.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<User, IamError> {
        let start = Instant::now();
        let result = self.authenticate_inner(identifier, password).await;
        observe("authenticate", start, &result);
        result
    }

    async fn authenticate_inner(&self, identifier: &str, password: &str) -> Result<User, IamError> {
        let record = match self.find_record(LookupField::Username, identifier).await? {
            Some(record) => Some(record),
            None => self.find_record(LookupField::Email, identifier).await?,
        };

        let Some(record) = record else {
            password::verify_dummy_password(password);
            tracing::debug!(target: "iam.directory", "Authentication failed: unknown identifier");
            return Err(IamError::InvalidCredentials);
        };

        if !password::verify_password(password, &record.password_hash)? {
            tracing::debug!(
                target: "iam.directory",
                user = %hash_for_correlation(&record.id.to_string()),
                "Authentication failed: wrong password"
            );
            return Err(IamError::InvalidCredentials);
        }

        self.to_user(&record)
    }
}

fn split(protected: Option<Protected>) -> (Option<String>, Option<String>) {
    match protected {
        Some(p) => (Some(p.encrypted), Some(p.hash)),
        None => (None, None),
    }
}
