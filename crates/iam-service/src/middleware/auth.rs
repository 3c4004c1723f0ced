//! Bearer authentication for protected routes.
//!
//! Verifies the access token, loads the subject through the identity
//! directory and stores it as [`AuthenticatedUser`] in request extensions.

use crate::errors::IamError;
use crate::models::User;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// The subject behind a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

fn extract_bearer_token(req: &Request) -> Result<&str, IamError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "iam.middleware.auth", "Missing Authorization header");
            IamError::InvalidToken("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "iam.middleware.auth", "Invalid Authorization header format");
        IamError::InvalidToken("Invalid Authorization header format".to_string())
    })
}

/// # Response
///
/// - 401 if the token is missing, invalid, expired, or its subject no
///   longer exists
/// - otherwise continues with `AuthenticatedUser` in extensions
#[instrument(skip_all, name = "iam.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, IamError> {
    let token = extract_bearer_token(&req)?;
    let claims = state.codec.verify_access_token(token)?;
    let subject = claims
        .subject()
        .map_err(|_| IamError::invalid_access_token())?;

    let user = match state.directory.get_by_id(&subject).await {
        Ok(user) => user,
        Err(IamError::NotFound(_)) => {
            tracing::debug!(target: "iam.middleware.auth", "Token subject no longer exists");
            return Err(IamError::invalid_access_token());
        }
        Err(e) => return Err(e),
    };

    req.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(req).await)
}
