use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::AuthError;
use crate::models::token::{Token, TokenScope};

/// Keyed storage of hashed tokens. Deletions are idempotent; inserting a
/// hash that already exists fails with `Conflict` (astronomically unlikely
/// for 32 random bytes, but handled). Multi-statement operations commit or
/// roll back as a unit.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Removes any token of the same scope for the user and inserts the
    /// given one, in one transaction.
    async fn replace(&self, token: &Token) -> Result<(), AuthError>;

    async fn find_by_scope_and_hash(
        &self,
        scope: TokenScope,
        hash: &str,
    ) -> Result<Option<Token>, AuthError>;

    /// Single-statement bulk delete, so a multi-scope revocation can never
    /// be observed half-applied.
    async fn delete_by_scopes_and_user(
        &self,
        scopes: &[TokenScope],
        user_id: i64,
    ) -> Result<(), AuthError>;

    /// Deletes both session scopes and inserts the new pair in one
    /// transaction: an interrupted rotation rolls back whole, never leaving
    /// the user half-credentialed.
    async fn rotate_session(
        &self,
        user_id: i64,
        auth: &Token,
        refresh: &Token,
    ) -> Result<(), AuthError>;
}

pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type TokenRow = (String, i64, DateTime<Utc>, i64);

async fn insert_token(conn: &mut PgConnection, token: &Token) -> Result<(), AuthError> {
    let res = sqlx::query(
        "INSERT INTO tokens (hash, scope, user_id, issued_at, expires_in_secs)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&token.hash)
    .bind(token.scope.as_str())
    .bind(token.user_id)
    .bind(token.issued_at)
    .bind(token.expires_in.num_seconds())
    .execute(conn)
    .await;

    match res {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
            Err(AuthError::Conflict("Token hash already exists.".into()))
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn replace(&self, token: &Token) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
            .bind(token.scope.as_str())
            .bind(token.user_id)
            .execute(&mut *tx)
            .await?;
        insert_token(&mut tx, token).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_by_scope_and_hash(
        &self,
        scope: TokenScope,
        hash: &str,
    ) -> Result<Option<Token>, AuthError> {
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT hash, user_id, issued_at, expires_in_secs
             FROM tokens WHERE scope = $1 AND hash = $2",
        )
        .bind(scope.as_str())
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(hash, user_id, issued_at, secs)| Token {
            hash,
            scope,
            user_id,
            issued_at,
            expires_in: Duration::seconds(secs),
        }))
    }

    async fn delete_by_scopes_and_user(
        &self,
        scopes: &[TokenScope],
        user_id: i64,
    ) -> Result<(), AuthError> {
        let scopes: Vec<String> = scopes.iter().map(|s| s.as_str().to_string()).collect();
        sqlx::query("DELETE FROM tokens WHERE scope = ANY($1) AND user_id = $2")
            .bind(&scopes)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate_session(
        &self,
        user_id: i64,
        auth: &Token,
        refresh: &Token,
    ) -> Result<(), AuthError> {
        let scopes = [
            TokenScope::Authentication.as_str().to_string(),
            TokenScope::Refresh.as_str().to_string(),
        ];
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tokens WHERE scope = ANY($1) AND user_id = $2")
            .bind(&scopes[..])
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        insert_token(&mut tx, auth).await?;
        insert_token(&mut tx, refresh).await?;
        tx.commit().await?;
        Ok(())
    }
}
