use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool};

use super::models::{
    ApiToken, Blog, BlogFilter, BlogWithOwner, Image, ImageWithOwner, NewPost, Post, PostChanges,
    PostFilter, PostWithRefs, Profile, ProfileChanges, ProfileFilter, ProfileWithUser, Session,
    User, UserChanges,
};
use super::now_timestamp;

// ========== Dynamic filters ==========

/// A value bound to a dynamically built WHERE clause.
#[derive(Debug, Clone)]
enum BindValue {
    Text(String),
    Int(i64),
}

/// WHERE clauses collected from optional filters, bound in order.
#[derive(Debug, Default)]
struct WhereBuilder {
    clauses: Vec<String>,
    values: Vec<BindValue>,
}

impl WhereBuilder {
    fn push(&mut self, clause: &str, values: impl IntoIterator<Item = BindValue>) {
        self.clauses.push(clause.to_string());
        self.values.extend(values);
    }

    fn text_eq(&mut self, column: &str, value: Option<&str>) {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.push(&format!("{column} = ?"), [BindValue::Text(v.to_string())]);
        }
    }

    /// Case-insensitive substring match over several columns.
    fn search(&mut self, columns: &[&str], term: Option<&str>) {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        let pattern = format!("%{}%", escape_like(term));
        let clause = columns
            .iter()
            .map(|c| format!("{c} LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push(
            &format!("({clause})"),
            columns.iter().map(|_| BindValue::Text(pattern.clone())),
        );
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn bind_all<'q, O>(
        &self,
        mut query: sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    ) -> sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>>
    where
        O: for<'r> FromRow<'r, SqliteRow>,
    {
        for value in &self.values {
            query = match value {
                BindValue::Text(s) => query.bind(s.clone()),
                BindValue::Int(i) => query.bind(*i),
            };
        }
        query
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ========== Users ==========

/// Get a user by ID.
pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by id")
}

/// Get a user by username.
pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by username")
}

/// Check if a username already exists.
pub async fn username_exists(pool: &SqlitePool, username: &str) -> Result<bool> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await
        .context("Failed to check username existence")?;
    Ok(row.0 > 0)
}

/// Create a new user without a profile.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    email: &str,
    is_admin: bool,
) -> Result<i64> {
    let now = now_timestamp();
    let result = sqlx::query(
        r"
        INSERT INTO users (username, password_hash, email, is_admin, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(username)
    .bind(password_hash)
    .bind(email)
    .bind(is_admin)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

/// Create a user together with an empty profile.
///
/// Returns `(user_id, profile_id)`.
pub async fn create_user_with_profile(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> Result<(i64, i64)> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin registration transaction")?;

    let now = now_timestamp();
    let user_id = sqlx::query(
        "INSERT INTO users (username, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .context("Failed to create user")?
    .last_insert_rowid();

    let profile_id = sqlx::query("INSERT INTO profiles (user_id) VALUES (?)")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to create profile")?
        .last_insert_rowid();

    tx.commit()
        .await
        .context("Failed to commit registration")?;

    Ok((user_id, profile_id))
}

/// Count total users.
pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;
    Ok(row.0)
}

/// Get all users with pagination, oldest first.
pub async fn get_all_users(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<User>> {
    sqlx::query_as("SELECT * FROM users ORDER BY id LIMIT ? OFFSET ?")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to get all users")
}

/// Update the account fields a user may edit themselves.
pub async fn update_user_fields(
    pool: &SqlitePool,
    user_id: i64,
    changes: &UserChanges,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE users
        SET email = COALESCE(?, email),
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            updated_at = ?
        WHERE id = ?
        ",
    )
    .bind(changes.email.as_deref())
    .bind(changes.first_name.as_deref())
    .bind(changes.last_name.as_deref())
    .bind(now_timestamp())
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to update user fields")?;
    Ok(())
}

/// Delete a user and everything they own.
pub async fn delete_user(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to delete user")?;
    Ok(result.rows_affected() > 0)
}

/// Increment failed login attempts.
pub async fn increment_failed_login_attempts(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE users SET failed_login_attempts = failed_login_attempts + 1, updated_at = ? WHERE id = ?",
    )
    .bind(now_timestamp())
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to increment failed login attempts")?;
    Ok(())
}

/// Reset failed login attempts.
pub async fn reset_failed_login_attempts(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE users SET failed_login_attempts = 0, locked_until = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(now_timestamp())
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to reset failed login attempts")?;
    Ok(())
}

/// Lock user account until specified time.
pub async fn lock_user_until(pool: &SqlitePool, user_id: i64, locked_until: &str) -> Result<()> {
    sqlx::query("UPDATE users SET locked_until = ?, updated_at = ? WHERE id = ?")
        .bind(locked_until)
        .bind(now_timestamp())
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to lock user account")?;
    Ok(())
}

// ========== Sessions ==========

/// Create a new session.
pub async fn create_session(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    csrf_token: &str,
    ip_address: &str,
    user_agent: Option<&str>,
    expires_at: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO sessions (user_id, token, csrf_token, ip_address, user_agent, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(user_id)
    .bind(token)
    .bind(csrf_token)
    .bind(ip_address)
    .bind(user_agent)
    .bind(expires_at)
    .bind(now_timestamp())
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(result.last_insert_rowid())
}

/// Get a session by token.
pub async fn get_session_by_token(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    sqlx::query_as("SELECT * FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch session by token")
}

/// Update session last_used_at.
pub async fn update_session_last_used(pool: &SqlitePool, session_id: i64) -> Result<()> {
    sqlx::query("UPDATE sessions SET last_used_at = ? WHERE id = ?")
        .bind(now_timestamp())
        .bind(session_id)
        .execute(pool)
        .await
        .context("Failed to update session last_used")?;
    Ok(())
}

/// Delete a session.
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to delete session")?;
    Ok(())
}

/// Count active sessions for a user.
pub async fn count_user_sessions(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count user sessions")?;
    Ok(row.0)
}

/// Delete oldest sessions for a user, keeping only the most recent `keep_count`.
pub async fn delete_oldest_user_sessions(
    pool: &SqlitePool,
    user_id: i64,
    keep_count: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r"
        DELETE FROM sessions
        WHERE user_id = ? AND id NOT IN (
            SELECT id FROM sessions
            WHERE user_id = ?
            ORDER BY COALESCE(last_used_at, created_at) DESC, id DESC
            LIMIT ?
        )
        ",
    )
    .bind(user_id)
    .bind(user_id)
    .bind(keep_count)
    .execute(pool)
    .await
    .context("Failed to delete oldest user sessions")?;
    Ok(result.rows_affected())
}

/// Delete expired sessions.
pub async fn delete_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now_timestamp())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;
    Ok(result.rows_affected())
}

// ========== API tokens ==========

/// Return the user's API token, creating one with `new_key` if none exists.
pub async fn get_or_create_api_token(
    pool: &SqlitePool,
    user_id: i64,
    new_key: &str,
) -> Result<ApiToken> {
    sqlx::query("INSERT OR IGNORE INTO api_tokens (key, user_id, created_at) VALUES (?, ?, ?)")
        .bind(new_key)
        .bind(user_id)
        .bind(now_timestamp())
        .execute(pool)
        .await
        .context("Failed to create API token")?;

    sqlx::query_as("SELECT * FROM api_tokens WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to fetch API token")
}

/// Resolve an API token key to its user.
pub async fn get_user_by_api_token(pool: &SqlitePool, key: &str) -> Result<Option<User>> {
    sqlx::query_as(
        r"
        SELECT u.* FROM users u
        JOIN api_tokens t ON t.user_id = u.id
        WHERE t.key = ?
        ",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch user by API token")
}

/// Delete the user's API token.
pub async fn delete_api_token(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM api_tokens WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to delete API token")?;
    Ok(())
}

// ========== Profiles ==========

const PROFILE_WITH_USER_SELECT: &str = r"
    SELECT p.id, p.user_id, p.birth_date, p.bio, p.avatar,
           u.username, u.first_name, u.last_name, u.email
    FROM profiles p
    JOIN users u ON u.id = p.user_id
";

/// Create an empty profile for a user.
pub async fn create_profile(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let result = sqlx::query("INSERT INTO profiles (user_id) VALUES (?)")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to create profile")?;
    Ok(result.last_insert_rowid())
}

/// Get the profile belonging to a user.
pub async fn get_profile_by_user(pool: &SqlitePool, user_id: i64) -> Result<Option<Profile>> {
    sqlx::query_as("SELECT * FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch profile by user")
}

/// Get a profile with its account fields.
pub async fn get_profile_with_user(pool: &SqlitePool, id: i64) -> Result<Option<ProfileWithUser>> {
    let sql = format!("{PROFILE_WITH_USER_SELECT} WHERE p.id = ?");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch profile with user")
}

fn profile_where(filter: &ProfileFilter) -> WhereBuilder {
    let mut builder = WhereBuilder::default();
    builder.search(
        &["u.username", "u.first_name", "u.last_name", "u.email", "p.birth_date"],
        filter.search.as_deref(),
    );
    builder.text_eq("u.username", filter.username.as_deref());
    builder.text_eq("u.first_name", filter.first_name.as_deref());
    builder.text_eq("u.last_name", filter.last_name.as_deref());
    builder.text_eq("u.email", filter.email.as_deref());
    if let Some(after) = filter.birthday_after.as_deref().filter(|v| !v.is_empty()) {
        builder.push("p.birth_date >= ?", [BindValue::Text(after.to_string())]);
    }
    if let Some(before) = filter.birthday_before.as_deref().filter(|v| !v.is_empty()) {
        builder.push("p.birth_date <= ?", [BindValue::Text(before.to_string())]);
    }
    builder
}

/// List profiles matching a filter.
pub async fn list_profiles(
    pool: &SqlitePool,
    filter: &ProfileFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProfileWithUser>> {
    let builder = profile_where(filter);
    let sql = format!(
        "{PROFILE_WITH_USER_SELECT} {} ORDER BY p.id LIMIT ? OFFSET ?",
        builder.sql()
    );
    builder
        .bind_all(sqlx::query_as(&sql))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list profiles")
}

/// Count profiles matching a filter.
pub async fn count_profiles(pool: &SqlitePool, filter: &ProfileFilter) -> Result<i64> {
    let builder = profile_where(filter);
    let sql = format!(
        "SELECT COUNT(*) FROM profiles p JOIN users u ON u.id = p.user_id {}",
        builder.sql()
    );
    let row: (i64,) = builder
        .bind_all(sqlx::query_as(&sql))
        .fetch_one(pool)
        .await
        .context("Failed to count profiles")?;
    Ok(row.0)
}

async fn write_profile_changes(
    conn: &mut SqliteConnection,
    profile_id: i64,
    changes: &ProfileChanges,
) -> Result<()> {
    if let Some(bio) = &changes.bio {
        sqlx::query("UPDATE profiles SET bio = ? WHERE id = ?")
            .bind(bio)
            .bind(profile_id)
            .execute(&mut *conn)
            .await
            .context("Failed to update bio")?;
    }

    if let Some(birth_date) = &changes.birth_date {
        sqlx::query("UPDATE profiles SET birth_date = ? WHERE id = ?")
            .bind(birth_date.as_deref())
            .bind(profile_id)
            .execute(&mut *conn)
            .await
            .context("Failed to update birth date")?;
    }

    if let Some(avatar) = &changes.avatar {
        sqlx::query("UPDATE profiles SET avatar = ? WHERE id = ?")
            .bind(avatar.as_deref())
            .bind(profile_id)
            .execute(&mut *conn)
            .await
            .context("Failed to update avatar")?;
    }
    Ok(())
}

/// Apply a partial profile update.
pub async fn update_profile(
    pool: &SqlitePool,
    profile_id: i64,
    changes: &ProfileChanges,
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin profile update")?;
    write_profile_changes(&mut tx, profile_id, changes).await?;
    tx.commit().await.context("Failed to commit profile update")?;
    Ok(())
}

/// Create a user's profile with its initial fields in one transaction.
pub async fn create_profile_with_changes(
    pool: &SqlitePool,
    user_id: i64,
    changes: &ProfileChanges,
) -> Result<i64> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin profile creation")?;

    let profile_id = sqlx::query("INSERT INTO profiles (user_id) VALUES (?)")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to create profile")?
        .last_insert_rowid();
    write_profile_changes(&mut tx, profile_id, changes).await?;

    tx.commit().await.context("Failed to commit profile creation")?;
    Ok(profile_id)
}

/// IDs of a profile's blogs, oldest first.
pub async fn get_blog_ids_for_profile(pool: &SqlitePool, profile_id: i64) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM blogs WHERE profile_id = ? ORDER BY id")
        .bind(profile_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch blog ids for profile")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// IDs of a profile's posts, oldest first.
pub async fn get_post_ids_for_profile(pool: &SqlitePool, profile_id: i64) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM posts WHERE profile_id = ? ORDER BY id")
        .bind(profile_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch post ids for profile")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

// ========== Blogs ==========

const BLOG_WITH_OWNER_SELECT: &str = r"
    SELECT b.id, b.profile_id, b.title, b.description, b.created_at,
           u.username,
           (SELECT COUNT(*) FROM posts WHERE posts.blog_id = b.id) AS post_count
    FROM blogs b
    JOIN profiles p ON p.id = b.profile_id
    JOIN users u ON u.id = p.user_id
";

/// Create a blog owned by a profile.
pub async fn create_blog(
    pool: &SqlitePool,
    profile_id: i64,
    title: &str,
    description: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO blogs (profile_id, title, description, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(profile_id)
    .bind(title)
    .bind(description)
    .bind(now_timestamp())
    .execute(pool)
    .await
    .context("Failed to create blog")?;
    Ok(result.last_insert_rowid())
}

/// Get a blog by ID.
pub async fn get_blog(pool: &SqlitePool, id: i64) -> Result<Option<Blog>> {
    sqlx::query_as("SELECT * FROM blogs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch blog")
}

/// Get a blog with its owner's username.
pub async fn get_blog_with_owner(pool: &SqlitePool, id: i64) -> Result<Option<BlogWithOwner>> {
    let sql = format!("{BLOG_WITH_OWNER_SELECT} WHERE b.id = ?");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch blog with owner")
}

/// Update a blog's title and description.
pub async fn update_blog(
    pool: &SqlitePool,
    id: i64,
    title: &str,
    description: &str,
) -> Result<()> {
    sqlx::query("UPDATE blogs SET title = ?, description = ? WHERE id = ?")
        .bind(title)
        .bind(description)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update blog")?;
    Ok(())
}

/// Delete a blog with its posts and images.
pub async fn delete_blog(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete blog")?;
    Ok(result.rows_affected() > 0)
}

fn blog_where(filter: &BlogFilter) -> WhereBuilder {
    let mut builder = WhereBuilder::default();
    builder.search(
        &["CAST(b.profile_id AS TEXT)", "b.title", "u.username"],
        filter.search.as_deref(),
    );
    builder.text_eq("u.username", filter.username.as_deref());
    builder.text_eq("b.title", filter.title.as_deref());
    if let Some(profile_id) = filter.profile_id {
        builder.push("b.profile_id = ?", [BindValue::Int(profile_id)]);
    }
    builder
}

/// List blogs matching a filter, oldest first.
pub async fn list_blogs(
    pool: &SqlitePool,
    filter: &BlogFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<BlogWithOwner>> {
    let builder = blog_where(filter);
    let sql = format!(
        "{BLOG_WITH_OWNER_SELECT} {} ORDER BY b.id LIMIT ? OFFSET ?",
        builder.sql()
    );
    builder
        .bind_all(sqlx::query_as(&sql))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list blogs")
}

/// Count blogs matching a filter.
pub async fn count_blogs(pool: &SqlitePool, filter: &BlogFilter) -> Result<i64> {
    let builder = blog_where(filter);
    let sql = format!(
        r"
        SELECT COUNT(*) FROM blogs b
        JOIN profiles p ON p.id = b.profile_id
        JOIN users u ON u.id = p.user_id
        {}
        ",
        builder.sql()
    );
    let row: (i64,) = builder
        .bind_all(sqlx::query_as(&sql))
        .fetch_one(pool)
        .await
        .context("Failed to count blogs")?;
    Ok(row.0)
}

/// Every blog of a profile, oldest first.
pub async fn get_blogs_for_profile(pool: &SqlitePool, profile_id: i64) -> Result<Vec<BlogWithOwner>> {
    let filter = BlogFilter {
        profile_id: Some(profile_id),
        ..BlogFilter::default()
    };
    // SQLite reads a negative LIMIT as "no limit".
    list_blogs(pool, &filter, -1, 0).await
}

/// IDs of a blog's posts, oldest first.
pub async fn get_post_ids_for_blog(pool: &SqlitePool, blog_id: i64) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM posts WHERE blog_id = ? ORDER BY id")
        .bind(blog_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch post ids for blog")?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

// ========== Posts ==========

const POST_WITH_REFS_SELECT: &str = r"
    SELECT po.id, po.blog_id, po.profile_id, po.title, po.tag, po.content,
           po.created_at, po.is_published, po.published_at,
           b.title AS blog_title, u.username
    FROM posts po
    JOIN blogs b ON b.id = po.blog_id
    JOIN profiles p ON p.id = po.profile_id
    JOIN users u ON u.id = p.user_id
";

/// Create an unpublished post.
pub async fn create_post(pool: &SqlitePool, post: &NewPost) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO posts (blog_id, profile_id, title, tag, content, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(post.blog_id)
    .bind(post.profile_id)
    .bind(&post.title)
    .bind(&post.tag)
    .bind(&post.content)
    .bind(now_timestamp())
    .execute(pool)
    .await
    .context("Failed to create post")?;
    Ok(result.last_insert_rowid())
}

/// Insert several unpublished posts atomically.
pub async fn create_posts_batch(pool: &SqlitePool, posts: &[NewPost]) -> Result<u64> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin post import transaction")?;

    let now = now_timestamp();
    let mut inserted = 0;
    for post in posts {
        sqlx::query(
            r"
            INSERT INTO posts (blog_id, profile_id, title, tag, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(post.blog_id)
        .bind(post.profile_id)
        .bind(&post.title)
        .bind(&post.tag)
        .bind(&post.content)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .context("Failed to insert imported post")?;
        inserted += 1;
    }

    tx.commit().await.context("Failed to commit post import")?;
    Ok(inserted)
}

/// Get a post by ID.
pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// Get a post with its blog title and owner username.
pub async fn get_post_with_refs(pool: &SqlitePool, id: i64) -> Result<Option<PostWithRefs>> {
    let sql = format!("{POST_WITH_REFS_SELECT} WHERE po.id = ?");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post with refs")
}

/// Apply a partial update to a post's text fields.
pub async fn update_post(pool: &SqlitePool, id: i64, changes: &PostChanges) -> Result<()> {
    sqlx::query(
        r"
        UPDATE posts
        SET title = COALESCE(?, title),
            tag = COALESCE(?, tag),
            content = COALESCE(?, content)
        WHERE id = ?
        ",
    )
    .bind(changes.title.as_deref())
    .bind(changes.tag.as_deref())
    .bind(changes.content.as_deref())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post")?;
    Ok(())
}

/// Delete a post with its images.
pub async fn delete_post(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;
    Ok(result.rows_affected() > 0)
}

/// Mark a post as published now.
pub async fn publish_post(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE posts SET is_published = 1, published_at = ? WHERE id = ?")
        .bind(now_timestamp())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to publish post")?;
    Ok(())
}

/// Withdraw a post and clear its publish timestamp.
pub async fn archive_post(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE posts SET is_published = 0, published_at = NULL WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to archive post")?;
    Ok(())
}

/// Flip a post between published and archived.
///
/// Returns the new published state.
pub async fn toggle_post_published(pool: &SqlitePool, id: i64) -> Result<bool> {
    let current: (bool,) = sqlx::query_as("SELECT is_published FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to read post publish state")?;

    if current.0 {
        archive_post(pool, id).await?;
        Ok(false)
    } else {
        publish_post(pool, id).await?;
        Ok(true)
    }
}

fn post_where(filter: &PostFilter) -> WhereBuilder {
    let mut builder = WhereBuilder::default();
    builder.search(&["po.title", "po.tag"], filter.search.as_deref());
    builder.text_eq("u.username", filter.username.as_deref());
    builder.text_eq("po.tag", filter.tag.as_deref());
    builder.text_eq("po.title", filter.title.as_deref());
    if filter.published_only {
        match filter.owner_profile_id {
            Some(profile_id) => builder.push(
                "(po.is_published = 1 OR po.profile_id = ?)",
                [BindValue::Int(profile_id)],
            ),
            None => builder.push("po.is_published = 1", []),
        }
    }
    builder
}

/// List posts matching a filter, oldest first.
pub async fn list_posts(
    pool: &SqlitePool,
    filter: &PostFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostWithRefs>> {
    let builder = post_where(filter);
    let sql = format!(
        "{POST_WITH_REFS_SELECT} {} ORDER BY po.id LIMIT ? OFFSET ?",
        builder.sql()
    );
    builder
        .bind_all(sqlx::query_as(&sql))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")
}

/// Count posts matching a filter.
pub async fn count_posts(pool: &SqlitePool, filter: &PostFilter) -> Result<i64> {
    let builder = post_where(filter);
    let sql = format!(
        r"
        SELECT COUNT(*) FROM posts po
        JOIN blogs b ON b.id = po.blog_id
        JOIN profiles p ON p.id = po.profile_id
        JOIN users u ON u.id = p.user_id
        {}
        ",
        builder.sql()
    );
    let row: (i64,) = builder
        .bind_all(sqlx::query_as(&sql))
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.0)
}

/// Posts of a blog, newest first. Unpublished posts are included only when asked.
pub async fn get_posts_for_blog(
    pool: &SqlitePool,
    blog_id: i64,
    include_unpublished: bool,
) -> Result<Vec<Post>> {
    sqlx::query_as(
        r"
        SELECT * FROM posts
        WHERE blog_id = ? AND (is_published = 1 OR ?)
        ORDER BY created_at DESC, id DESC
        ",
    )
    .bind(blog_id)
    .bind(include_unpublished)
    .fetch_all(pool)
    .await
    .context("Failed to fetch posts for blog")
}

/// Published posts, most recently published first.
pub async fn get_latest_published_posts(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostWithRefs>> {
    let sql = format!(
        "{POST_WITH_REFS_SELECT} WHERE po.is_published = 1 ORDER BY po.published_at DESC, po.id DESC LIMIT ? OFFSET ?"
    );
    sqlx::query_as(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch latest published posts")
}

/// Count published posts.
pub async fn count_published_posts(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE is_published = 1")
        .fetch_one(pool)
        .await
        .context("Failed to count published posts")?;
    Ok(row.0)
}

/// All published posts for the sitemap, oldest first.
pub async fn get_all_published_posts(pool: &SqlitePool) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE is_published = 1 ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to fetch published posts")
}

// ========== Images ==========

/// Attach an image to a post.
pub async fn create_image(pool: &SqlitePool, post_id: i64, title: &str, file: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO images (post_id, title, file) VALUES (?, ?, ?)")
        .bind(post_id)
        .bind(title)
        .bind(file)
        .execute(pool)
        .await
        .context("Failed to create image")?;
    Ok(result.last_insert_rowid())
}

/// Get an image by ID.
pub async fn get_image(pool: &SqlitePool, id: i64) -> Result<Option<Image>> {
    sqlx::query_as("SELECT * FROM images WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch image")
}

/// Get an image with the profile that owns its post.
pub async fn get_image_with_owner(pool: &SqlitePool, id: i64) -> Result<Option<ImageWithOwner>> {
    sqlx::query_as(
        r"
        SELECT i.id, i.post_id, i.title, i.file, po.profile_id AS owner_profile_id
        FROM images i
        JOIN posts po ON po.id = i.post_id
        WHERE i.id = ?
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch image with owner")
}

/// Images of a post, in upload order.
pub async fn get_images_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<Image>> {
    sqlx::query_as("SELECT * FROM images WHERE post_id = ? ORDER BY id")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch images for post")
}

/// Update an image's title and/or file.
pub async fn update_image(
    pool: &SqlitePool,
    id: i64,
    title: Option<&str>,
    file: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE images SET title = COALESCE(?, title), file = COALESCE(?, file) WHERE id = ?")
        .bind(title)
        .bind(file)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update image")?;
    Ok(())
}

/// Delete an image row.
pub async fn delete_image(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM images WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete image")?;
    Ok(result.rows_affected() > 0)
}

/// Stored file paths of a post's images.
pub async fn get_image_files_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT file FROM images WHERE post_id = ?")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch image files for post")?;
    Ok(rows.into_iter().map(|(f,)| f).collect())
}

/// Stored file paths of every image in a blog.
pub async fn get_image_files_for_blog(pool: &SqlitePool, blog_id: i64) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r"
        SELECT i.file FROM images i
        JOIN posts po ON po.id = i.post_id
        WHERE po.blog_id = ?
        ",
    )
    .bind(blog_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch image files for blog")?;
    Ok(rows.into_iter().map(|(f,)| f).collect())
}

/// Stored file paths owned by a user: the avatar and every post image.
pub async fn get_media_files_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r"
        SELECT pr.avatar FROM profiles pr
        WHERE pr.user_id = ? AND pr.avatar IS NOT NULL
        UNION ALL
        SELECT i.file FROM images i
        JOIN posts po ON po.id = i.post_id
        JOIN profiles pr ON pr.id = po.profile_id
        WHERE pr.user_id = ?
        ",
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch media files for user")?;
    Ok(rows.into_iter().map(|(f,)| f).collect())
}

/// Whether any image or avatar still points at a stored file.
pub async fn media_file_in_use(pool: &SqlitePool, file: &str) -> Result<bool> {
    let in_use: bool = sqlx::query_scalar(
        r"
        SELECT EXISTS(SELECT 1 FROM images WHERE file = ?)
            OR EXISTS(SELECT 1 FROM profiles WHERE avatar = ?)
        ",
    )
    .bind(file)
    .bind(file)
    .fetch_one(pool)
    .await
    .context("Failed to check media file references")?;
    Ok(in_use)
}
