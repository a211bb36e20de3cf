use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy of the authentication core. Every failure is surfaced
/// as a typed variant; the existence-hiding paths (activation and
/// password-reset token creation for unknown emails) return `Ok(None)`
/// instead of erring, so user enumeration stays impossible.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User not found.")]
    UserNotFound,
    #[error("Token not found.")]
    TokenNotFound,
    #[error("Token has expired.")]
    TokenExpired,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Account is locked. Try again later.")]
    AccountLocked,
    #[error("User account is already active.")]
    AlreadyActive,
    #[error("User profile not found.")]
    ProfileNotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AuthError::Internal(format!("password hashing failed: {e}"))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::UserNotFound
            | AuthError::TokenNotFound
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AccountLocked => StatusCode::LOCKED,
            AuthError::ProfileNotFound => StatusCode::NOT_FOUND,
            AuthError::AlreadyActive | AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Storage(_) | AuthError::Internal(_) => {
                tracing::error!("request failed: {self}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error." })),
                )
                    .into_response();
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
