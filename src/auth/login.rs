//! Credential checks with escalating account lockout.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use super::verify_password;
use crate::db::{self as queries, format_timestamp, parse_timestamp, User};

/// Consecutive failures that trigger the first lock.
pub const LOCKOUT_THRESHOLD: i32 = 5;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Username and password are required")]
    MissingCredentials,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Account has been deactivated")]
    Inactive,
    #[error("Account is temporarily locked due to failed login attempts")]
    Locked,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Lock length after a failed attempt, given the failures recorded before it.
#[must_use]
pub fn lockout_minutes(previous_failures: i32) -> Option<i64> {
    match previous_failures {
        n if n < LOCKOUT_THRESHOLD - 1 => None,
        4 => Some(5),
        5 => Some(15),
        6 => Some(60),
        _ => Some(240),
    }
}

/// Whether the account is locked at the current time.
#[must_use]
pub fn is_locked(user: &User) -> bool {
    user.locked_until
        .as_deref()
        .and_then(parse_timestamp)
        .is_some_and(|until| until > Utc::now())
}

/// Check a username and password, recording failures.
pub async fn authenticate(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<User, LoginError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(LoginError::MissingCredentials);
    }

    let Some(user) = queries::get_user_by_username(pool, username).await? else {
        return Err(LoginError::InvalidCredentials);
    };

    if !user.is_active {
        return Err(LoginError::Inactive);
    }
    if is_locked(&user) {
        return Err(LoginError::Locked);
    }

    if !verify_password(password, &user.password_hash)? {
        queries::increment_failed_login_attempts(pool, user.id).await?;
        if let Some(minutes) = lockout_minutes(user.failed_login_attempts) {
            let until = format_timestamp(Utc::now() + Duration::minutes(minutes));
            queries::lock_user_until(pool, user.id, &until).await?;
            tracing::warn!(user_id = user.id, minutes, "Account locked after failed logins");
        }
        return Err(LoginError::InvalidCredentials);
    }

    if user.failed_login_attempts > 0 || user.locked_until.is_some() {
        queries::reset_failed_login_attempts(pool, user.id).await?;
    }

    Ok(user)
}
