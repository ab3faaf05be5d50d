//! Administrator account created from configuration on startup.

use anyhow::Result;
use sqlx::SqlitePool;

use super::{hash_password, validate_username};
use crate::db as queries;

/// Create the administrator account and its profile unless the username is taken.
///
/// Returns `true` when a new account was created. An existing account is left
/// untouched, including its password.
pub async fn ensure_admin(pool: &SqlitePool, username: &str, password: &str) -> Result<bool> {
    let username = username.trim();
    validate_username(username).map_err(|e| anyhow::anyhow!("Invalid admin username: {e}"))?;

    if queries::username_exists(pool, username).await? {
        tracing::debug!(username = %username, "Admin account already exists");
        return Ok(false);
    }

    let password_hash = hash_password(password)?;
    let user_id = queries::create_user(pool, username, &password_hash, "", true).await?;
    queries::create_profile(pool, user_id).await?;
    tracing::info!(user_id, username = %username, "Created admin account");
    Ok(true)
}
