use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Security-relevant projection of a user row.
///
/// `locked_at` and `locked_duration` are set and cleared together; the
/// account is currently locked iff both are set and the window has not
/// elapsed. Only the token service mutates the lock bookkeeping.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub failed_login_attempts: i32,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_duration: Option<Duration>,
    /// Optimistic concurrency version, bumped on every save.
    pub lock_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied on registration; everything else takes its column default.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Identity resolved from a valid authentication token: the user plus the
/// flattened set of role and privilege names.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub authorities: HashSet<String>,
    pub email_verified: bool,
}

// Request/Response DTOs

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Public profile view. The email is private: it is only included when the
/// viewer is the profile owner.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn of(user: User, own_profile: bool) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: own_profile.then_some(user.email),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
        }
    }
}
