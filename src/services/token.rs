use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::SecurityConfig;
use crate::db::token_repository::TokenRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AuthError;
use crate::models::token::{IssuedToken, Token, TokenPair, TokenScope};
use crate::models::user::{Principal, User};
use crate::services::events::{EventSink, TokenEvent};
use crate::services::generator::TokenGenerator;
use crate::services::lock;
use crate::services::password::PasswordHasher;

/// Orchestrates the token lifecycle: issuance, validation, rotation and
/// revocation across all four scopes, plus the brute-force lockout gate on
/// authentication.
///
/// Every state-mutating operation maps onto a single transactional store
/// call, so a fault mid-operation leaves either the old state or the new
/// state, never a mix. The one deliberate exception is the failed-attempt
/// bookkeeping during login, which is its own write so it survives the
/// `InvalidCredentials` failure of the enclosing operation.
pub struct TokenService {
    security: SecurityConfig,
    generator: TokenGenerator,
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    events: EventSink,
}

impl TokenService {
    pub fn new(
        security: SecurityConfig,
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        events: EventSink,
    ) -> Self {
        let generator = TokenGenerator::new(security.token_byte_size);
        Self {
            security,
            generator,
            users,
            tokens,
            hasher,
            clock,
            events,
        }
    }

    /// Character length of every token this service issues; the bearer gate
    /// rejects credentials of any other length before touching the store.
    pub fn token_length(&self) -> usize {
        self.generator.token_length()
    }

    /// Issues a fresh activation token for the given address, replacing any
    /// previous one, and publishes the mail event.
    ///
    /// An unknown address yields `Ok(None)` with no error and no event, so
    /// the response never discloses whether the address is registered.
    pub async fn create_activation_token(
        &self,
        email: &str,
    ) -> Result<Option<IssuedToken>, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };

        let (token, issued) = self.mint(
            &user,
            TokenScope::Activation,
            self.security.activation_token_ttl,
        );
        self.tokens.replace(&token).await?;

        self.events.publish(TokenEvent::ActivationTokenCreated {
            email: email.to_string(),
            token: issued.clone(),
        });

        Ok(Some(issued))
    }

    /// Marks the owning account's email as verified and burns all
    /// activation tokens for it, in one transaction.
    pub async fn activate_account(&self, token: &str) -> Result<(), AuthError> {
        let token = self.validate(token, TokenScope::Activation).await?;
        let mut user = self.load_user(token.user_id).await?;

        if user.email_verified {
            return Err(AuthError::AlreadyActive);
        }

        user.email_verified = true;
        self.users
            .save_and_delete_tokens(&mut user, &[TokenScope::Activation])
            .await?;

        info!(user_id = user.id, "user account activated");
        Ok(())
    }

    /// Same existence-hiding contract as `create_activation_token`, for the
    /// password-reset scope.
    pub async fn create_password_reset_token(
        &self,
        email: &str,
    ) -> Result<Option<IssuedToken>, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };

        let (token, issued) = self.mint(
            &user,
            TokenScope::PasswordReset,
            self.security.password_reset_token_ttl,
        );
        self.tokens.replace(&token).await?;

        self.events.publish(TokenEvent::PasswordResetTokenCreated {
            email: email.to_string(),
            token: issued.clone(),
        });

        Ok(Some(issued))
    }

    /// Sets the new password and revokes every reset, authentication and
    /// refresh token for the user in one transaction: the new password and
    /// the forced re-login everywhere commit together, so the presented
    /// reset token can never survive a successful password change.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let token = self.validate(token, TokenScope::PasswordReset).await?;
        let mut user = self.load_user(token.user_id).await?;

        user.password_hash = self.hasher.encode(new_password)?;
        self.users
            .save_and_delete_tokens(
                &mut user,
                &[
                    TokenScope::PasswordReset,
                    TokenScope::Authentication,
                    TokenScope::Refresh,
                ],
            )
            .await?;

        info!(user_id = user.id, "password reset, all sessions revoked");
        Ok(())
    }

    /// Runs the lockout state machine, checks the password and on success
    /// rotates the session token pair.
    ///
    /// The failed-attempt/lock bookkeeping is persisted before the
    /// `InvalidCredentials` failure is returned, so the security side effect
    /// survives the failed operation.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        let mut user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let now = self.clock.now();

        if lock::is_locked(&user, now) {
            return Err(AuthError::AccountLocked);
        }
        if user.locked_at.is_some() || user.locked_duration.is_some() {
            // Lock window has elapsed: clear and persist the bookkeeping
            // before the password is even checked.
            lock::clear(&mut user);
            self.users.save(&mut user).await?;
            debug!(user_id = user.id, "expired account lock cleared");
        }

        if !self.hasher.matches(password, &user.password_hash)? {
            lock::register_failure(&mut user, now, &self.security);
            self.users.save(&mut user).await?;
            if lock::is_locked(&user, now) {
                info!(
                    user_id = user.id,
                    attempts = user.failed_login_attempts,
                    "account locked after repeated failed login attempts"
                );
            }
            return Err(AuthError::InvalidCredentials);
        }

        if lock::needs_reset(&user) {
            lock::clear(&mut user);
            self.users.save(&mut user).await?;
        }

        self.rotate_session_tokens(&user).await
    }

    /// Rotates the session pair from a refresh token. The presented token
    /// is single-use: it is deleted together with the rest of the old pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let token = self.validate(refresh_token, TokenScope::Refresh).await?;
        let user = self.load_user(token.user_id).await?;
        self.rotate_session_tokens(&user).await
    }

    /// Logout everywhere: removes all authentication and refresh tokens.
    pub async fn revoke_all_sessions(&self, user_id: i64) -> Result<(), AuthError> {
        self.tokens
            .delete_by_scopes_and_user(
                &[TokenScope::Authentication, TokenScope::Refresh],
                user_id,
            )
            .await
    }

    /// Resolves a presented token to the owning user's principal view.
    pub async fn resolve_principal(
        &self,
        scope: TokenScope,
        token: &str,
    ) -> Result<Principal, AuthError> {
        let token = self.validate(token, scope).await?;
        let user = self.load_user(token.user_id).await?;
        let authorities = self.users.find_authorities(user.id).await?;

        Ok(Principal {
            id: user.id,
            username: user.username,
            email: user.email,
            authorities,
            email_verified: user.email_verified,
        })
    }

    /// Old pair and new pair swap in one store transaction; a fault leaves
    /// the old pair intact, never a half-rotated session.
    async fn rotate_session_tokens(&self, user: &User) -> Result<TokenPair, AuthError> {
        let (auth_token, auth) = self.mint(
            user,
            TokenScope::Authentication,
            self.security.auth_token_ttl,
        );
        let (refresh_token, refresh) =
            self.mint(user, TokenScope::Refresh, self.security.refresh_token_ttl);

        self.tokens
            .rotate_session(user.id, &auth_token, &refresh_token)
            .await?;

        Ok(TokenPair { auth, refresh })
    }

    fn mint(&self, user: &User, scope: TokenScope, ttl: Duration) -> (Token, IssuedToken) {
        let plaintext = self.generator.generate();
        let issued_at = self.clock.now();
        let token = Token {
            hash: self.generator.hash(&plaintext),
            scope,
            user_id: user.id,
            issued_at,
            expires_in: ttl,
        };
        let issued = IssuedToken {
            plaintext,
            expiry: issued_at + ttl,
        };
        (token, issued)
    }

    async fn validate(&self, plaintext: &str, scope: TokenScope) -> Result<Token, AuthError> {
        let hash = self.generator.hash(plaintext);
        let token = self
            .tokens
            .find_by_scope_and_hash(scope, &hash)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if !token.is_valid_at(self.clock.now()) {
            return Err(AuthError::TokenExpired);
        }

        Ok(token)
    }

    async fn load_user(&self, id: i64) -> Result<User, AuthError> {
        self.users.find_by_id(id).await?.ok_or(AuthError::UserNotFound)
    }
}
