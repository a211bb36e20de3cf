use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Purpose-class of a token. Each scope partitions the token namespace and
/// is rotated independently, except AUTHENTICATION and REFRESH which are
/// always issued and revoked as a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Activation,
    Authentication,
    Refresh,
    PasswordReset,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
            TokenScope::Refresh => "refresh",
            TokenScope::PasswordReset => "password_reset",
        }
    }
}

impl std::str::FromStr for TokenScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activation" => Ok(TokenScope::Activation),
            "authentication" => Ok(TokenScope::Authentication),
            "refresh" => Ok(TokenScope::Refresh),
            "password_reset" => Ok(TokenScope::PasswordReset),
            _ => Err(anyhow::anyhow!("Unknown token scope: {s}")),
        }
    }
}

/// Stored token row. Only the SHA-256 hash of the plaintext is ever
/// persisted; the hash is the primary key.
#[derive(Debug, Clone)]
pub struct Token {
    pub hash: String,
    pub scope: TokenScope,
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_in: Duration,
}

impl Token {
    pub fn expiry(&self) -> DateTime<Utc> {
        self.issued_at + self.expires_in
    }

    /// Strict inequality: a token whose expiry equals `now` is expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry()
    }
}

/// Plaintext handed back to the caller exactly once, with its expiry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedToken {
    pub plaintext: String,
    pub expiry: DateTime<Utc>,
}

/// Result of a successful authentication or refresh. Never persisted;
/// constructed fresh on every issuance.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub auth: IssuedToken,
    pub refresh: IssuedToken,
}

// Request/Response DTOs

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivationTokenRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivateAccountRequest {
    pub activation_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetTokenRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(t: IssuedToken) -> Self {
        Self {
            token: t.plaintext,
            expiry: t.expiry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub auth_token: TokenResponse,
    pub refresh_token: TokenResponse,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(p: TokenPair) -> Self {
        Self {
            auth_token: p.auth.into(),
            refresh_token: p.refresh.into(),
        }
    }
}
