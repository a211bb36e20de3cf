use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::AuthError;
use crate::middleware::auth::{CurrentUser, MaybeUser};
use crate::models::user::{NewUser, Principal, ProfileResponse, RegisterRequest, UserResponse};
use crate::AppState;

/// Creates the account inactive and mails out the first activation token.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let password_hash = state.hasher.encode(&body.password)?;
    let user = state
        .users
        .create(NewUser {
            username: body.username,
            email: body.email,
            password_hash,
        })
        .await?;

    state.tokens.create_activation_token(&user.email).await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn me(CurrentUser(principal): CurrentUser) -> Json<Principal> {
    Json(principal)
}

/// Public profile; the owner additionally sees their email address.
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AuthError> {
    let user = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or(AuthError::ProfileNotFound)?;
    let own_profile = viewer.is_some_and(|v| v.id == user.id);
    Ok(Json(ProfileResponse::of(user, own_profile)))
}
