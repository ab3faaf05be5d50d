use anyhow::Result;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sqlx::SqlitePool;

use super::generate_csrf_token;
use crate::db::{self as queries, format_timestamp};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Sessions kept per user; the oldest are dropped on login.
pub const MAX_SESSIONS_PER_USER: i64 = 10;

/// Generate a cryptographically secure random session token.
pub fn generate_session_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Session duration in seconds.
#[derive(Debug, Clone, Copy)]
pub enum SessionDuration {
    /// 1 hour for non-remember-me sessions
    Short,
    /// 30 days for remember-me sessions
    Long,
}

impl SessionDuration {
    #[must_use]
    pub const fn as_seconds(&self) -> i64 {
        match self {
            Self::Short => 3600,
            Self::Long => 2_592_000,
        }
    }

    #[must_use]
    pub const fn from_remember(remember: bool) -> Self {
        if remember {
            Self::Long
        } else {
            Self::Short
        }
    }
}

/// A freshly created login session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub csrf_token: String,
    pub max_age: i64,
}

/// Create a session row for a user, evicting the oldest when over the limit.
pub async fn start_session(
    pool: &SqlitePool,
    user_id: i64,
    duration: SessionDuration,
    ip_address: &str,
    user_agent: Option<&str>,
) -> Result<NewSession> {
    let session_count = queries::count_user_sessions(pool, user_id).await?;
    if session_count >= MAX_SESSIONS_PER_USER {
        let removed =
            queries::delete_oldest_user_sessions(pool, user_id, MAX_SESSIONS_PER_USER - 1).await?;
        tracing::debug!(user_id, removed, "Evicted old sessions");
    }

    let token = generate_session_token();
    let csrf_token = generate_csrf_token();
    let expires_at = format_timestamp(Utc::now() + Duration::seconds(duration.as_seconds()));

    queries::create_session(
        pool,
        user_id,
        &token,
        &csrf_token,
        ip_address,
        user_agent,
        &expires_at,
    )
    .await?;

    Ok(NewSession {
        token,
        csrf_token,
        max_age: duration.as_seconds(),
    })
}

/// `Set-Cookie` value for a new session.
#[must_use]
pub fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}{secure}")
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Read the session token from the request's `Cookie` header.
#[must_use]
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_generate_session_token() {
        let token1 = generate_session_token();
        let token2 = generate_session_token();

        assert_eq!(token1.len(), 64);
        assert_eq!(token2.len(), 64);
        assert_ne!(token1, token2);
        assert!(token1.chars().all(|c| c.is_alphanumeric()));
    }

    #[test]
    fn test_session_duration() {
        assert_eq!(SessionDuration::Short.as_seconds(), 3600);
        assert_eq!(SessionDuration::Long.as_seconds(), 2_592_000);
        assert_eq!(SessionDuration::from_remember(true).as_seconds(), 2_592_000);
    }

    #[test]
    fn test_session_cookie() {
        let cookie = session_cookie("abc", 3600, false);
        assert_eq!(cookie, "session=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=3600");
        assert!(session_cookie("abc", 60, true).ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn test_session_token_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token_from_headers(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=tok123; other=1"),
        );
        assert_eq!(session_token_from_headers(&headers), Some("tok123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("sessionx=nope"));
        assert_eq!(session_token_from_headers(&headers), None);
    }
}
