//! User endpoints.
//!
//! Each handler asks the policy engine before touching the directory, so a
//! denied caller learns nothing about whether the target exists.

use crate::authz::{Action, ResourceAttrs, SubjectAttrs};
use crate::errors::IamError;
use crate::middleware::AuthenticatedUser;
use crate::models::{parse_user_id, User, UserUpdate};
use crate::observability::hash_for_correlation;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

fn authorize(
    state: &AppState,
    caller: &User,
    resource: &ResourceAttrs,
    action: Action,
) -> Result<(), IamError> {
    if state
        .policy
        .can(&SubjectAttrs::from(caller), resource, action)?
    {
        return Ok(());
    }
    tracing::debug!(
        target: "iam.handler.users",
        caller = %hash_for_correlation(&caller.id.to_string()),
        resource_type = %resource.resource_type(),
        action = %action,
        "Access denied"
    );
    Err(IamError::Forbidden)
}

/// `GET /api/v1/me`
pub async fn get_me(Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>) -> Json<User> {
    Json(user)
}

/// `GET /api/v1/users/:id`
#[instrument(skip_all, name = "iam.handler.get_user")]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<User>, IamError> {
    let id = parse_user_id(&id)?;
    authorize(&state, &caller, &ResourceAttrs::user(&id), Action::Read)?;
    Ok(Json(state.directory.get_by_id(&id).await?))
}

/// `PUT /api/v1/users/:id`
#[instrument(skip_all, name = "iam.handler.update_user")]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(changes): Json<UserUpdate>,
) -> Result<Json<User>, IamError> {
    let id = parse_user_id(&id)?;
    authorize(&state, &caller, &ResourceAttrs::user(&id), Action::Update)?;
    Ok(Json(state.directory.update(&id, changes).await?))
}

/// `DELETE /api/v1/users/:id`
///
/// Ends the user's sessions, then deletes the account.
#[instrument(skip_all, name = "iam.handler.delete_user")]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, IamError> {
    let id = parse_user_id(&id)?;
    authorize(&state, &caller, &ResourceAttrs::user(&id), Action::Delete)?;
    state.registration.delete_account(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
