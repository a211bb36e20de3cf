use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::error::AuthError;
use crate::models::token::TokenScope;
use crate::models::user::Principal;
use crate::services::token::TokenService;

/// Extractor for routes that require a valid authentication token. Pulls
/// the bearer credential from the Authorization header and resolves it to
/// the owning user's principal.
///
/// A credential of the wrong length is rejected before the store is ever
/// consulted; all issued tokens share one fixed length.
pub struct CurrentUser(pub Principal);

/// Extension type carrying the token service through request extensions.
#[derive(Clone)]
pub struct TokenServiceHandle(pub Arc<TokenService>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<TokenServiceHandle>()
            .ok_or_else(|| AuthError::Internal("token service not configured".into()))?
            .0
            .clone();

        let token = bearer_token(parts, service.token_length()).ok_or(AuthError::TokenNotFound)?;
        let principal = service
            .resolve_principal(TokenScope::Authentication, &token)
            .await?;

        Ok(CurrentUser(principal))
    }
}

/// Extractor for routes that serve both anonymous and logged-in callers.
/// Only a missing Authorization header proceeds unauthenticated; a header
/// that is present but malformed, unknown or expired is rejected with the
/// same 401 the required extractor gives.
pub struct MaybeUser(pub Option<Principal>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.get(header::AUTHORIZATION).is_none() {
            return Ok(MaybeUser(None));
        }
        let CurrentUser(principal) = CurrentUser::from_request_parts(parts, state).await?;
        Ok(MaybeUser(Some(principal)))
    }
}

fn bearer_token(parts: &Parts, expected_length: usize) -> Option<String> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    if token.len() != expected_length {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use chrono::Duration;

    use super::*;
    use crate::config::SecurityConfig;
    use crate::services::events::EventSink;
    use crate::testing::{fixed_now, test_user, FixedClock, InMemoryStore, PlainTextHasher};

    fn service() -> (Arc<TokenService>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::default());
        let (sink, _events) = EventSink::new();
        let service = TokenService::new(
            SecurityConfig::default(),
            store.clone(),
            store.clone(),
            Arc::new(PlainTextHasher::default()),
            Arc::new(FixedClock(fixed_now())),
            sink,
        );
        (Arc::new(service), store)
    }

    fn parts_with(service: Arc<TokenService>, authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/users/me");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        parts.extensions.insert(TokenServiceHandle(service));
        parts
    }

    #[tokio::test]
    async fn resolves_principal_from_bearer_token() {
        let (service, store) = service();
        store.insert_user(test_user(1, "user", "user@example.com"));
        store.set_authorities(1, &["ROLE_USER"]);
        let pair = service.authenticate("user", "password").await.unwrap();

        let mut parts = parts_with(
            service,
            Some(&format!("Bearer {}", pair.auth.plaintext)),
        );
        let CurrentUser(principal) = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(principal.id, 1);
        assert_eq!(principal.username, "user");
        assert!(principal.authorities.contains("ROLE_USER"));
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let (service, _) = service();
        let mut parts = parts_with(service, None);
        assert!(matches!(
            CurrentUser::from_request_parts(&mut parts, &()).await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn rejects_wrong_length_token_without_lookup() {
        let (service, _) = service();
        let mut parts = parts_with(service, Some("Bearer too-short"));
        assert!(matches!(
            CurrentUser::from_request_parts(&mut parts, &()).await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let (service, _) = service();
        let mut parts = parts_with(service, Some("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            CurrentUser::from_request_parts(&mut parts, &()).await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn maybe_user_is_none_without_credential() {
        let (service, _) = service();
        let mut parts = parts_with(service, None);
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn maybe_user_resolves_valid_credential() {
        let (service, store) = service();
        store.insert_user(test_user(7, "someone", "someone@example.com"));
        let pair = service.authenticate("someone", "password").await.unwrap();

        let mut parts = parts_with(
            service,
            Some(&format!("Bearer {}", pair.auth.plaintext)),
        );
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(user.unwrap().id, 7);
    }

    #[tokio::test]
    async fn maybe_user_rejects_present_but_invalid_credential() {
        let (service, _) = service();
        let mut parts = parts_with(service, Some("Bearer not-a-real-token"));
        assert!(matches!(
            MaybeUser::from_request_parts(&mut parts, &()).await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn maybe_user_rejects_expired_credential() {
        let (service, store) = service();
        store.insert_user(test_user(1, "user", "user@example.com"));
        let pair = service.authenticate("user", "password").await.unwrap();

        let (sink, _events) = EventSink::new();
        let later = Arc::new(TokenService::new(
            SecurityConfig::default(),
            store.clone(),
            store.clone(),
            Arc::new(PlainTextHasher::default()),
            Arc::new(FixedClock(fixed_now() + Duration::hours(1))),
            sink,
        ));
        let mut parts = parts_with(later, Some(&format!("Bearer {}", pair.auth.plaintext)));
        assert!(matches!(
            MaybeUser::from_request_parts(&mut parts, &()).await,
            Err(AuthError::TokenExpired)
        ));
    }
}
