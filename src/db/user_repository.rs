use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};

use crate::error::AuthError;
use crate::models::token::TokenScope;
use crate::models::user::{NewUser, User};

/// User lookups return found/not-found, never an error for absence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AuthError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
    async fn create(&self, user: NewUser) -> Result<User, AuthError>;

    /// Persists the mutable security fields. Uses `lock_version` optimistic
    /// concurrency: a concurrent update surfaces as `Conflict` so a racing
    /// failed-attempt increment is retried, never silently lost.
    async fn save(&self, user: &mut User) -> Result<(), AuthError>;

    /// Persists the user and deletes the given token scopes in one
    /// transaction. Account activation and password reset go through here
    /// so the row update and the token revocation commit together.
    async fn save_and_delete_tokens(
        &self,
        user: &mut User,
        scopes: &[TokenScope],
    ) -> Result<(), AuthError>;

    /// Flattened role names and privilege names for the user.
    async fn find_authorities(&self, user_id: i64) -> Result<HashSet<String>, AuthError>;
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, email_verified, \
     failed_login_attempts, locked_at, locked_duration_secs, lock_version, \
     created_at, updated_at";

type UserRow = (
    i64,
    String,
    String,
    String,
    bool,
    i32,
    Option<DateTime<Utc>>,
    Option<i64>,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn row_to_user(row: UserRow) -> User {
    let (
        id,
        username,
        email,
        password_hash,
        email_verified,
        failed_login_attempts,
        locked_at,
        locked_duration_secs,
        lock_version,
        created_at,
        updated_at,
    ) = row;
    User {
        id,
        username,
        email,
        password_hash,
        email_verified,
        failed_login_attempts,
        locked_at,
        locked_duration: locked_duration_secs.map(Duration::seconds),
        lock_version,
        created_at,
        updated_at,
    }
}

/// Optimistic-concurrency update; returns the affected row count.
async fn update_user(conn: &mut PgConnection, user: &User) -> Result<u64, AuthError> {
    let res = sqlx::query(
        "UPDATE users
         SET password_hash = $1,
             email_verified = $2,
             failed_login_attempts = $3,
             locked_at = $4,
             locked_duration_secs = $5,
             lock_version = lock_version + 1,
             updated_at = NOW()
         WHERE id = $6 AND lock_version = $7",
    )
    .bind(&user.password_hash)
    .bind(user.email_verified)
    .bind(user.failed_login_attempts)
    .bind(user.locked_at)
    .bind(user.locked_duration.map(|d| d.num_seconds()))
    .bind(user.id)
    .bind(user.lock_version)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(row_to_user))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_user))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(row_to_user))
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let res: Result<UserRow, sqlx::Error> = sqlx::query_as(&format!(
            "INSERT INTO users (username, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await;

        match res {
            Ok(row) => Ok(row_to_user(row)),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                // Concurrent registrations can both pass the pre-check and
                // collide on the unique index.
                let msg = match db.constraint() {
                    Some("users_username_key") => "Username already in use.",
                    Some("users_email_key") => "Email already in use.",
                    _ => "User already exists.",
                };
                Err(AuthError::Conflict(msg.into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, user: &mut User) -> Result<(), AuthError> {
        let mut conn = self.pool.acquire().await?;
        if update_user(&mut conn, user).await? == 0 {
            return Err(AuthError::Conflict(
                "User was modified concurrently.".into(),
            ));
        }
        user.lock_version += 1;
        Ok(())
    }

    async fn save_and_delete_tokens(
        &self,
        user: &mut User,
        scopes: &[TokenScope],
    ) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;
        if update_user(&mut tx, user).await? == 0 {
            // Dropping the transaction rolls it back.
            return Err(AuthError::Conflict(
                "User was modified concurrently.".into(),
            ));
        }
        let scopes: Vec<String> = scopes.iter().map(|s| s.as_str().to_string()).collect();
        sqlx::query("DELETE FROM tokens WHERE scope = ANY($1) AND user_id = $2")
            .bind(&scopes)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        user.lock_version += 1;
        Ok(())
    }

    async fn find_authorities(&self, user_id: i64) -> Result<HashSet<String>, AuthError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT r.name FROM roles r
               JOIN users_roles ur ON ur.role_id = r.id
              WHERE ur.user_id = $1
             UNION
             SELECT p.name FROM privileges p
               JOIN roles_privileges rp ON rp.privilege_id = p.id
               JOIN users_roles ur ON ur.role_id = rp.role_id
              WHERE ur.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names.into_iter().collect())
    }
}
