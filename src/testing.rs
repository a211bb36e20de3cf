//! In-memory collaborator doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::clock::Clock;
use crate::db::token_repository::TokenRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AuthError;
use crate::models::token::{Token, TokenScope};
use crate::models::user::{NewUser, User};
use crate::services::password::PasswordHasher;

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn test_user(id: i64, username: &str, email: &str) -> User {
    User {
        id,
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "hashed:password".to_string(),
        email_verified: true,
        failed_login_attempts: 0,
        locked_at: None,
        locked_duration: None,
        lock_version: 0,
        created_at: fixed_now(),
        updated_at: fixed_now(),
    }
}

/// Backing store double implementing both repository traits, so the
/// cross-table transactional writes behave like their Postgres
/// counterparts: each method applies all of its effects or none.
///
/// `fail_next_user_save` / `fail_next_token_write` arm the next write to
/// fail with `Conflict` before anything is touched, standing in for a
/// stale `lock_version` or a colliding token hash.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<i64, User>>,
    tokens: Mutex<HashMap<String, Token>>,
    authorities: Mutex<HashMap<i64, HashSet<String>>>,
    saves: AtomicUsize,
    fail_next_user_save: AtomicBool,
    fail_next_token_write: AtomicBool,
}

impl InMemoryStore {
    pub fn insert_user(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn set_authorities(&self, user_id: i64, names: &[&str]) {
        self.authorities
            .lock()
            .unwrap()
            .insert(user_id, names.iter().map(|s| s.to_string()).collect());
    }

    pub fn user(&self, id: i64) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn seed_token(&self, token: Token) {
        self.tokens.lock().unwrap().insert(token.hash.clone(), token);
    }

    pub fn tokens_for(&self, scope: TokenScope, user_id: i64) -> Vec<Token> {
        self.tokens
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.scope == scope && t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    pub fn fail_next_user_save(&self) {
        self.fail_next_user_save.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_token_write(&self) {
        self.fail_next_token_write.store(true, Ordering::SeqCst);
    }

    fn user_save_armed(&self) -> bool {
        self.fail_next_user_save.swap(false, Ordering::SeqCst)
    }

    fn token_write_armed(&self) -> bool {
        self.fail_next_token_write.swap(false, Ordering::SeqCst)
    }

    fn apply_user_save(&self, user: &mut User) {
        self.saves.fetch_add(1, Ordering::SeqCst);
        user.lock_version += 1;
        self.users.lock().unwrap().insert(user.id, user.clone());
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let mut users = self.users.lock().unwrap();
        let id = users.keys().max().copied().unwrap_or(0) + 1;
        let mut created = test_user(id, &user.username, &user.email);
        created.password_hash = user.password_hash;
        created.email_verified = false;
        users.insert(id, created.clone());
        Ok(created)
    }

    async fn save(&self, user: &mut User) -> Result<(), AuthError> {
        if self.user_save_armed() {
            return Err(AuthError::Conflict(
                "User was modified concurrently.".into(),
            ));
        }
        self.apply_user_save(user);
        Ok(())
    }

    async fn save_and_delete_tokens(
        &self,
        user: &mut User,
        scopes: &[TokenScope],
    ) -> Result<(), AuthError> {
        if self.user_save_armed() {
            return Err(AuthError::Conflict(
                "User was modified concurrently.".into(),
            ));
        }
        self.apply_user_save(user);
        self.tokens
            .lock()
            .unwrap()
            .retain(|_, t| !(scopes.contains(&t.scope) && t.user_id == user.id));
        Ok(())
    }

    async fn find_authorities(&self, user_id: i64) -> Result<HashSet<String>, AuthError> {
        Ok(self
            .authorities
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn replace(&self, token: &Token) -> Result<(), AuthError> {
        if self.token_write_armed() {
            return Err(AuthError::Conflict("Token hash already exists.".into()));
        }
        let mut tokens = self.tokens.lock().unwrap();
        tokens.retain(|_, t| !(t.scope == token.scope && t.user_id == token.user_id));
        tokens.insert(token.hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_scope_and_hash(
        &self,
        scope: TokenScope,
        hash: &str,
    ) -> Result<Option<Token>, AuthError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .get(hash)
            .filter(|t| t.scope == scope)
            .cloned())
    }

    async fn delete_by_scopes_and_user(
        &self,
        scopes: &[TokenScope],
        user_id: i64,
    ) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .unwrap()
            .retain(|_, t| !(scopes.contains(&t.scope) && t.user_id == user_id));
        Ok(())
    }

    async fn rotate_session(
        &self,
        user_id: i64,
        auth: &Token,
        refresh: &Token,
    ) -> Result<(), AuthError> {
        if self.token_write_armed() {
            return Err(AuthError::Conflict("Token hash already exists.".into()));
        }
        let mut tokens = self.tokens.lock().unwrap();
        tokens.retain(|_, t| {
            !((t.scope == TokenScope::Authentication || t.scope == TokenScope::Refresh)
                && t.user_id == user_id)
        });
        tokens.insert(auth.hash.clone(), auth.clone());
        tokens.insert(refresh.hash.clone(), refresh.clone());
        Ok(())
    }
}

/// Transparent hasher: `encode(p)` = `"hashed:" + p`. Counts `matches`
/// calls so tests can assert the password was never checked.
#[derive(Default)]
pub struct PlainTextHasher {
    matches_calls: AtomicUsize,
}

impl PlainTextHasher {
    pub fn matches_calls(&self) -> usize {
        self.matches_calls.load(Ordering::SeqCst)
    }
}

impl PasswordHasher for PlainTextHasher {
    fn encode(&self, raw: &str) -> Result<String, AuthError> {
        Ok(format!("hashed:{raw}"))
    }

    fn matches(&self, raw: &str, hash: &str) -> Result<bool, AuthError> {
        self.matches_calls.fetch_add(1, Ordering::SeqCst);
        Ok(hash == format!("hashed:{raw}"))
    }
}
