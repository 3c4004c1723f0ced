//! Authentication endpoints.
//!
//! Thin adapters over the registration service and the session manager.
//! Every refresh-token failure maps to the same 401 body.

use crate::errors::IamError;
use crate::middleware::AuthenticatedUser;
use crate::models::{TokenPair, User};
use crate::routes::AppState;
use crate::services::RegistrationRequest;
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// `POST /api/v1/auth/register`
#[instrument(skip_all, name = "iam.handler.register")]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<User>), IamError> {
    let user = state.registration.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/v1/auth/login`
#[instrument(skip_all, name = "iam.handler.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, IamError> {
    let (user, tokens) = state
        .registration
        .login(&request.identifier, &request.password)
        .await?;
    Ok(Json(LoginResponse { user, tokens }))
}

/// `POST /api/v1/auth/refresh`
#[instrument(skip_all, name = "iam.handler.refresh")]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, IamError> {
    let tokens = state.sessions.rotate(&request.refresh_token).await?;
    Ok(Json(tokens))
}

/// `POST /api/v1/auth/logout`
#[instrument(skip_all, name = "iam.handler.logout")]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<StatusCode, IamError> {
    state.sessions.revoke(&request.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/auth/logout-all` (authenticated)
#[instrument(skip_all, name = "iam.handler.logout_all")]
pub async fn logout_all(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<StatusCode, IamError> {
    state.sessions.end_all(&user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
