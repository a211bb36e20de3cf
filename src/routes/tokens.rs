use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::error::AuthError;
use crate::middleware::auth::CurrentUser;
use crate::models::token::{
    ActivateAccountRequest, ActivationTokenRequest, AuthenticateRequest,
    PasswordResetConfirmRequest, PasswordResetTokenRequest, RefreshTokenRequest,
    TokenPairResponse,
};
use crate::AppState;

pub async fn authenticate(
    State(state): State<AppState>,
    Json(body): Json<AuthenticateRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let pair = state
        .tokens
        .authenticate(&body.username, &body.password)
        .await?;
    Ok(Json(pair.into()))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let pair = state.tokens.refresh(&body.refresh_token).await?;
    Ok(Json(pair.into()))
}

/// Logout everywhere: revokes both session tokens of the caller.
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<StatusCode, AuthError> {
    state.tokens.revoke_all_sessions(principal.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Responds identically whether or not the address is registered; the
/// token itself only ever leaves the system by mail.
pub async fn request_activation_token(
    State(state): State<AppState>,
    Json(body): Json<ActivationTokenRequest>,
) -> Result<(StatusCode, Json<Value>), AuthError> {
    state.tokens.create_activation_token(&body.email).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "If the address is registered, an activation token has been sent."
        })),
    ))
}

pub async fn activate_account(
    State(state): State<AppState>,
    Json(body): Json<ActivateAccountRequest>,
) -> Result<Json<Value>, AuthError> {
    state.tokens.activate_account(&body.activation_token).await?;
    Ok(Json(json!({ "message": "Account activated." })))
}

pub async fn request_password_reset_token(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetTokenRequest>,
) -> Result<(StatusCode, Json<Value>), AuthError> {
    state
        .tokens
        .create_password_reset_token(&body.email)
        .await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "If the address is registered, a password reset token has been sent."
        })),
    ))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetConfirmRequest>,
) -> Result<Json<Value>, AuthError> {
    state
        .tokens
        .reset_password(&body.token, &body.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password updated. Please log in again." })))
}
