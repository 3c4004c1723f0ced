use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Coarse message returned for every refresh-token failure.
pub const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";

/// Coarse message returned for every access-token failure.
pub const INVALID_ACCESS_TOKEN: &str = "The access token is invalid or expired";

#[derive(Debug, Error)]
pub enum IamError {
    /// Malformed identifier, bad input, or bad key material.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation on a lookup attribute or session hash.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Signature mismatch, expiry, inactive session. The message is always coarse.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The policy engine denied the request.
    #[error("Forbidden")]
    Forbidden,

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// The policy engine could not evaluate a rule. Never a denial.
    #[error("Policy evaluation error: {0}")]
    PolicyEvaluation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl IamError {
    /// Bounded error category for metrics labels.
    pub fn category(&self) -> &'static str {
        match self {
            IamError::Validation(_) | IamError::NotFound(_) | IamError::Conflict(_) => "request",
            IamError::InvalidCredentials | IamError::InvalidToken(_) => "authentication",
            IamError::Forbidden | IamError::PolicyEvaluation(_) => "authorization",
            IamError::Crypto(_) => "cryptographic",
            IamError::Database(_) | IamError::Internal => "internal",
        }
    }

    pub(crate) fn invalid_refresh_token() -> Self {
        IamError::InvalidToken(INVALID_REFRESH_TOKEN.to_string())
    }

    pub(crate) fn invalid_access_token() -> Self {
        IamError::InvalidToken(INVALID_ACCESS_TOKEN.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for IamError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            IamError::Validation(reason) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", reason.clone())
            }
            IamError::NotFound(what) => (StatusCode::NOT_FOUND, "NOT_FOUND", what.clone()),
            IamError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            IamError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            IamError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            IamError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You are not allowed to perform this action".to_string(),
            ),
            IamError::Crypto(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CRYPTO_ERROR",
                "An internal cryptographic error occurred".to_string(),
            ),
            IamError::PolicyEvaluation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "POLICY_EVALUATION_ERROR",
                "Authorization could not be evaluated".to_string(),
            ),
            IamError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "An internal database error occurred".to_string(),
            ),
            IamError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<sqlx::Error> for IamError {
    fn from(err: sqlx::Error) -> Self {
        IamError::Database(err.to_string())
    }
}
