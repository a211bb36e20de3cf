// Library exports for the api binary and tests
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use sqlx::PgPool;

use crate::db::user_repository::UserRepository;
use crate::services::password::PasswordHasher;
use crate::services::token::TokenService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub users: Arc<dyn UserRepository>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<TokenService>,
}
