use std::env;
use std::str::FromStr;

use chrono::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub security: SecurityConfig,
    // SMTP (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

/// Token and lockout knobs. Defaults follow the security policy: 32-byte
/// tokens, 3-day activation window, 15-minute reset window, 1-hour auth
/// tokens, 30-day refresh tokens, and a 15-minute lockout after 5 failed
/// attempts.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub token_byte_size: usize,
    pub bcrypt_cost: u32,
    pub activation_token_ttl: Duration,
    pub password_reset_token_ttl: Duration,
    pub auth_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub account_lock_duration: Duration,
    pub max_failed_login_attempts: i32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            token_byte_size: 32,
            bcrypt_cost: 12,
            activation_token_ttl: Duration::days(3),
            password_reset_token_ttl: Duration::minutes(15),
            auth_token_ttl: Duration::hours(1),
            refresh_token_ttl: Duration::days(30),
            account_lock_duration: Duration::minutes(15),
            max_failed_login_attempts: 5,
        }
    }
}

impl SecurityConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let d = SecurityConfig::default();
        Ok(Self {
            token_byte_size: parsed("TOKEN_BYTE_SIZE", d.token_byte_size)?,
            bcrypt_cost: parsed("BCRYPT_COST", d.bcrypt_cost)?,
            activation_token_ttl: seconds("ACTIVATION_TOKEN_TTL_SECS", d.activation_token_ttl)?,
            password_reset_token_ttl: seconds(
                "PASSWORD_RESET_TOKEN_TTL_SECS",
                d.password_reset_token_ttl,
            )?,
            auth_token_ttl: seconds("AUTH_TOKEN_TTL_SECS", d.auth_token_ttl)?,
            refresh_token_ttl: seconds("REFRESH_TOKEN_TTL_SECS", d.refresh_token_ttl)?,
            account_lock_duration: seconds("ACCOUNT_LOCK_DURATION_SECS", d.account_lock_duration)?,
            max_failed_login_attempts: parsed(
                "MAX_FAILED_LOGIN_ATTEMPTS",
                d.max_failed_login_attempts,
            )?,
        })
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT").unwrap_or_else(|_| "8080".into()).parse()?,
            security: SecurityConfig::from_env()?,
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|s| !s.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_from: env::var("SMTP_FROM").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

fn parsed<T: FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) => Ok(v.parse()?),
        Err(_) => Ok(default),
    }
}

fn seconds(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(key) {
        Ok(v) => Ok(Duration::seconds(v.parse()?)),
        Err(_) => Ok(default),
    }
}
