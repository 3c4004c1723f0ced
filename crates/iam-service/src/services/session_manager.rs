//! Session lifecycle.
//!
//! Per subject the session moves through:
//!
//! ```text
//! No-Session --issue--> Active --rotate--> Active
//!                         |
//!                         +--revoke--> Revoked      (soft: is_active = false)
//! any state --end_all--> No-Session                 (hard delete)
//! ```
//!
//! A refresh token is located by its search-key hash, then checked for
//! state, signature and subject. Every refusal surfaces as the same
//! `InvalidToken("Invalid or expired refresh token")`; the precise cause
//! only reaches logs and the `reason` metric label.

use crate::crypto::{SearchKeyHasher, TokenCodec};
use crate::errors::IamError;
use crate::models::{SessionGrant, SessionRecord, TokenPair};
use crate::observability::{hash_for_correlation, metrics};
use crate::repositories::SessionStore;
use chrono::{DateTime, Utc};
use common::types::UserId;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Why a refresh token was refused. Never shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    NotFound,
    Inactive,
    Expired,
    Signature,
    SubjectMismatch,
    /// Another rotation or revocation changed the record first.
    Superseded,
}

impl Refusal {
    fn as_str(self) -> &'static str {
        match self {
            Refusal::NotFound => "not_found",
            Refusal::Inactive => "inactive",
            Refusal::Expired => "expired",
            Refusal::Signature => "signature",
            Refusal::SubjectMismatch => "subject_mismatch",
            Refusal::Superseded => "superseded",
        }
    }
}

/// A refresh token that passed every check.
struct Resolved {
    user_id: UserId,
    token_hash: String,
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    codec: Arc<dyn TokenCodec>,
    hasher: Arc<dyn SearchKeyHasher>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        codec: Arc<dyn TokenCodec>,
        hasher: Arc<dyn SearchKeyHasher>,
    ) -> Self {
        Self {
            store,
            codec,
            hasher,
        }
    }

    fn refuse(operation: &str, refusal: Refusal) -> IamError {
        tracing::debug!(
            target: "iam.session",
            operation,
            reason = refusal.as_str(),
            "Refresh token refused"
        );
        metrics::record_session_operation(operation, "error", Some(refusal.as_str()));
        IamError::invalid_refresh_token()
    }

    fn mint(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(TokenPair, SessionGrant), IamError> {
        let access = self.codec.generate_access_token(user_id)?;
        let refresh = self.codec.generate_refresh_token(user_id)?;
        let grant = SessionGrant {
            refresh_token_hash: self.hasher.generate_search_key(&refresh)?,
            expires_at: now + self.codec.refresh_token_ttl(),
            last_login_at: now,
        };
        let pair = TokenPair::bearer(access, refresh, self.codec.access_token_ttl().num_seconds());
        Ok((pair, grant))
    }

    /// Locate and verify a presented refresh token.
    async fn lookup(
        &self,
        operation: &str,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Resolved, IamError> {
        let token_hash = self.hasher.generate_search_key(refresh_token)?;
        let Some(record) = self.store.find_by_token_hash(&token_hash).await? else {
            return Err(Self::refuse(operation, Refusal::NotFound));
        };
        check_state(&record, now).map_err(|r| Self::refuse(operation, r))?;

        let claims = self
            .codec
            .decode_refresh_token(refresh_token)
            .map_err(|_| Self::refuse(operation, Refusal::Signature))?;
        let subject = claims
            .subject()
            .map_err(|_| Self::refuse(operation, Refusal::Signature))?;
        if subject.as_uuid() != &record.user_id {
            return Err(Self::refuse(operation, Refusal::SubjectMismatch));
        }

        Ok(Resolved {
            user_id: subject,
            token_hash,
        })
    }

    /// Start (or restart) the session for `user_id` and return a fresh pair.
    ///
    /// Any previous refresh token for the subject stops working.
    #[instrument(skip_all)]
    pub async fn issue(&self, user_id: &UserId) -> Result<TokenPair, IamError> {
        let now = Utc::now();
        let (pair, grant) = self.mint(user_id, now)?;

        if let Err(e) = self.store.upsert_for_user(user_id, grant).await {
            metrics::record_session_operation("issue", "error", Some("store"));
            return Err(e);
        }

        tracing::info!(
            target: "iam.session",
            user = %hash_for_correlation(&user_id.to_string()),
            "Session issued"
        );
        metrics::record_session_operation("issue", "success", None);
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The presented token is consumed: after success it no longer resolves.
    /// Of two concurrent rotations with the same token, exactly one wins.
    #[instrument(skip_all)]
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, IamError> {
        let now = Utc::now();
        let resolved = self.lookup("rotate", refresh_token, now).await?;
        let (pair, grant) = self.mint(&resolved.user_id, now)?;

        let applied = self
            .store
            .rotate(&resolved.user_id, &resolved.token_hash, grant, now)
            .await?;
        if !applied {
            return Err(Self::refuse("rotate", Refusal::Superseded));
        }

        tracing::debug!(
            target: "iam.session",
            user = %hash_for_correlation(&resolved.user_id.to_string()),
            "Session rotated"
        );
        metrics::record_session_operation("rotate", "success", None);
        Ok(pair)
    }

    /// Return the subject that owns a live refresh token.
    #[instrument(skip_all)]
    pub async fn resolve(&self, refresh_token: &str) -> Result<UserId, IamError> {
        let resolved = self.lookup("resolve", refresh_token, Utc::now()).await?;
        metrics::record_session_operation("resolve", "success", None);
        Ok(resolved.user_id)
    }

    /// Log out: deactivate the session in place.
    #[instrument(skip_all)]
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), IamError> {
        let now = Utc::now();
        let resolved = self.lookup("revoke", refresh_token, now).await?;

        if !self
            .store
            .revoke(&resolved.user_id, &resolved.token_hash, now)
            .await?
        {
            return Err(Self::refuse("revoke", Refusal::Superseded));
        }

        tracing::info!(
            target: "iam.session",
            user = %hash_for_correlation(&resolved.user_id.to_string()),
            "Session revoked"
        );
        metrics::record_session_operation("revoke", "success", None);
        Ok(())
    }

    /// Drop the subject's session record entirely.
    ///
    /// Returns whether a record existed.
    #[instrument(skip_all)]
    pub async fn end_all(&self, user_id: &UserId) -> Result<bool, IamError> {
        let existed = self.store.delete_for_user(user_id).await?;
        tracing::info!(
            target: "iam.session",
            user = %hash_for_correlation(&user_id.to_string()),
            existed,
            "All sessions ended"
        );
        metrics::record_session_operation("end_all", "success", None);
        Ok(existed)
    }
}

fn check_state(record: &SessionRecord, now: DateTime<Utc>) -> Result<(), Refusal> {
    if !record.is_active {
        return Err(Refusal::Inactive);
    }
    if record.expires_at <= now {
        return Err(Refusal::Expired);
    }
    Ok(())
}
