use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    if current_version < 2 {
        debug!("Running migration v2");
        run_migration_v2(pool).await?;
        set_schema_version(pool, 2).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Accounts: users, web sessions and API tokens.
async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating account tables");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            is_admin INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            failed_login_attempts INTEGER NOT NULL DEFAULT 0,
            locked_until TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token TEXT UNIQUE NOT NULL,
            csrf_token TEXT NOT NULL,
            ip_address TEXT NOT NULL,
            user_agent TEXT,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            last_used_at TEXT
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create sessions table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
        .execute(pool)
        .await
        .context("Failed to create sessions user index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)")
        .execute(pool)
        .await
        .context("Failed to create sessions expiry index")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS api_tokens (
            key TEXT PRIMARY KEY,
            user_id INTEGER UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create api_tokens table")?;

    Ok(())
}

/// Blogging: profiles, blogs, posts and images.
async fn run_migration_v2(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v2: creating blogging tables");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            birth_date TEXT,
            bio TEXT NOT NULL DEFAULT '',
            avatar TEXT
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create profiles table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS blogs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create blogs table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_blogs_profile ON blogs(profile_id)")
        .execute(pool)
        .await
        .context("Failed to create blogs profile index")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            blog_id INTEGER NOT NULL REFERENCES blogs(id) ON DELETE CASCADE,
            profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            tag TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            is_published INTEGER NOT NULL DEFAULT 0,
            published_at TEXT
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_blog ON posts(blog_id)")
        .execute(pool)
        .await
        .context("Failed to create posts blog index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(is_published, published_at DESC)",
    )
    .execute(pool)
    .await
    .context("Failed to create posts published index")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            file TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create images table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_post ON images(post_id)")
        .execute(pool)
        .await
        .context("Failed to create images post index")?;

    Ok(())
}
