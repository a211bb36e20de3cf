//! Per-user brute-force lockout state machine.
//!
//! The lock is evaluated lazily on each authentication attempt instead of
//! being swept by a timer: an elapsed lock window is cleared (and persisted)
//! by the caller before the password is even checked. The account is locked
//! iff `locked_at` is set and `now < locked_at + locked_duration`.

use chrono::{DateTime, Utc};

use crate::config::SecurityConfig;
use crate::models::user::User;

/// Whether the account currently rejects login attempts.
pub fn is_locked(user: &User, now: DateTime<Utc>) -> bool {
    match (user.locked_at, user.locked_duration) {
        (Some(at), Some(duration)) => now < at + duration,
        _ => false,
    }
}

/// True if any failed-attempt or lock bookkeeping remains to be cleared.
pub fn needs_reset(user: &User) -> bool {
    user.failed_login_attempts > 0 || user.locked_at.is_some() || user.locked_duration.is_some()
}

pub fn clear(user: &mut User) {
    user.failed_login_attempts = 0;
    user.locked_at = None;
    user.locked_duration = None;
}

/// Records a failed password check; the attempt that reaches the configured
/// maximum locks the account for the configured window.
pub fn register_failure(user: &mut User, now: DateTime<Utc>, security: &SecurityConfig) {
    user.failed_login_attempts += 1;
    if user.failed_login_attempts >= security.max_failed_login_attempts {
        user.locked_at = Some(now);
        user.locked_duration = Some(security.account_lock_duration);
    }
}
