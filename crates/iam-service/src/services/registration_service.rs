//! Account flows: register, login and account deletion.
//!
//! Registration validates the request, hashes the password and hands a
//! [`NewUser`] to the directory. Login authenticates through the directory
//! and starts a session.

use crate::crypto::password;
use crate::errors::IamError;
use crate::models::{NewUser, TokenPair, User};
use crate::services::identity_directory::IdentityDirectory;
use crate::services::session_manager::SessionManager;
use common::types::UserId;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

const MIN_PASSWORD_LENGTH: usize = 8;
const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;
const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Registration request. Exactly one contact is needed; both are allowed.
#[derive(Clone, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("has_email", &self.email.is_some())
            .field("has_phone", &self.phone_number.is_some())
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

pub struct RegistrationService {
    directory: Arc<IdentityDirectory>,
    sessions: Arc<SessionManager>,
    bcrypt_cost: u32,
}

impl fmt::Debug for RegistrationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationService")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish_non_exhaustive()
    }
}

impl RegistrationService {
    pub fn new(
        directory: Arc<IdentityDirectory>,
        sessions: Arc<SessionManager>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            directory,
            sessions,
            bcrypt_cost,
        }
    }

    /// Register a new account.
    ///
    /// # Steps
    ///
    /// 1. Validate email and/or phone shape
    /// 2. Validate password strength
    /// 3. Hash password (bcrypt at the configured cost)
    /// 4. Create the user; the username defaults to the email, else the phone
    ///
    /// Duplicate username or contact pair is `Conflict`.
    #[instrument(skip_all)]
    pub async fn register(&self, request: RegistrationRequest) -> Result<User, IamError> {
        let email = trimmed(request.email);
        let phone = trimmed(request.phone_number);

        match (&email, &phone) {
            (None, None) => {
                return Err(IamError::Validation(
                    "Either an email or a phone number is required".to_string(),
                ))
            }
            (Some(email), _) if !is_valid_email(email) => {
                return Err(IamError::Validation("Invalid email format".to_string()))
            }
            (_, Some(phone)) if !is_valid_phone(phone) => {
                return Err(IamError::Validation(
                    "Invalid phone number format".to_string(),
                ))
            }
            _ => {}
        }

        if !is_strong_password(&request.password) {
            return Err(IamError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters and contain \
                 upper and lower case letters, a digit and a special character"
            )));
        }

        let username = trimmed(request.username)
            .or_else(|| email.clone())
            .or_else(|| phone.clone())
            .unwrap_or_default();

        let password_hash = password::hash_password(&request.password, self.bcrypt_cost)?;

        self.directory
            .create(NewUser {
                username,
                email,
                phone_number: phone,
                password_hash,
                first_name: trimmed(request.first_name),
                last_name: trimmed(request.last_name),
                ..NewUser::default()
            })
            .await
    }

    /// Authenticate by username or email and start a session.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<(User, TokenPair), IamError> {
        let user = self.directory.authenticate(identifier, password).await?;
        let tokens = self.sessions.issue(&user.id).await?;
        Ok((user, tokens))
    }

    /// End every session for the user, then delete the account.
    #[instrument(skip_all)]
    pub async fn delete_account(&self, user_id: &UserId) -> Result<(), IamError> {
        self.sessions.end_all(user_id).await?;
        self.directory.delete(user_id).await
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `local@domain.tld` with a conservative character set and an alphabetic
/// TLD of at least two letters.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));

    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());

    local_ok && host_ok && tld_ok
}

/// Optional leading `+`, then 10 to 15 digits.
fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_strong_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::crypto::token::TokenCodecSettings;
    use crate::crypto::{AesGcmFieldCipher, HmacSearchKeyHasher, JwtTokenCodec};
    use crate::repositories::{MemorySessionStore, MemoryUserStore};
    use std::time::Duration as StdDuration;

    const PASSWORD: &str = "Sup3r#Secret";

    fn service() -> RegistrationService {
        let hasher = Arc::new(HmacSearchKeyHasher::new(&[0x22; 32]).unwrap());
        let directory = Arc::new(IdentityDirectory::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(AesGcmFieldCipher::new(&[0x11; 32]).unwrap()),
            hasher.clone(),
        ));
        let codec = Arc::new(
            JwtTokenCodec::new(TokenCodecSettings {
                access_secret: &[0x33; 32],
                refresh_secret: &[0x44; 32],
                issuer: "parley-iam",
                access_ttl_seconds: 900,
                refresh_ttl_seconds: 86_400,
                clock_skew: StdDuration::ZERO,
            })
            .unwrap(),
        );
        let sessions = Arc::new(SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            codec,
            hasher,
        ));
        RegistrationService::new(directory, sessions, 10)
    }

    fn by_email(email: &str) -> RegistrationRequest {
        RegistrationRequest {
            username: None,
            email: Some(email.to_string()),
            phone_number: None,
            password: PASSWORD.to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("user@example.c"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("+15551234567"));
        assert!(is_valid_phone("5551234567"));
        assert!(!is_valid_phone("+1555"));
        assert!(!is_valid_phone("+1234567890123456"));
        assert!(!is_valid_phone("555-123-4567"));
    }

    #[test]
    fn test_password_strength() {
        assert!(is_strong_password(PASSWORD));
        assert!(!is_strong_password("Sh0rt#"));
        assert!(!is_strong_password("alllower1#"));
        assert!(!is_strong_password("ALLUPPER1#"));
        assert!(!is_strong_password("NoDigits#x"));
        assert!(!is_strong_password("NoSpecial1x"));
    }

    #[tokio::test]
    async fn test_register_defaults_username_to_email() {
        let svc = service();
        let user = svc.register(by_email("new@example.com")).await.unwrap();
        assert_eq!(user.username, "new@example.com");
        assert_eq!(user.email.as_deref(), Some("new@example.com"));
    }

    #[tokio::test]
    async fn test_register_by_phone() {
        let svc = service();
        let user = svc
            .register(RegistrationRequest {
                email: None,
                phone_number: Some("+15551234567".to_string()),
                ..by_email("")
            })
            .await
            .unwrap();
        assert_eq!(user.username, "+15551234567");
        assert!(user.email.is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let svc = service();
        assert!(matches!(
            svc.register(by_email("not-an-email")).await,
            Err(IamError::Validation(_))
        ));
        assert!(matches!(
            svc.register(RegistrationRequest {
                email: None,
                ..by_email("")
            })
            .await,
            Err(IamError::Validation(_))
        ));
        assert!(matches!(
            svc.register(RegistrationRequest {
                password: "weak".to_string(),
                ..by_email("weak@example.com")
            })
            .await,
            Err(IamError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_register_same_email_different_case_conflicts() {
        let svc = service();
        svc.register(by_email("dup@example.com")).await.unwrap();
        let err = svc.register(by_email("  DUP@Example.com ")).await.unwrap_err();
        assert!(matches!(err, IamError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_issues_tokens() {
        let svc = service();
        let registered = svc.register(by_email("login@example.com")).await.unwrap();

        let (user, tokens) = svc.login("login@example.com", PASSWORD).await.unwrap();
        assert_eq!(user.id, registered.id);
        assert!(!tokens.access_token.is_empty());
        assert_eq!(
            svc.sessions.resolve(&tokens.refresh_token).await.unwrap(),
            user.id
        );

        assert!(matches!(
            svc.login("login@example.com", "Wrong#Pass1").await,
            Err(IamError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_delete_account_ends_sessions() {
        let svc = service();
        svc.register(by_email("bye@example.com")).await.unwrap();
        let (user, tokens) = svc.login("bye@example.com", PASSWORD).await.unwrap();

        svc.delete_account(&user.id).await.unwrap();

        assert!(svc.sessions.resolve(&tokens.refresh_token).await.is_err());
        assert!(matches!(
            svc.directory.get_by_id(&user.id).await,
            Err(IamError::NotFound(_))
        ));
    }
}
