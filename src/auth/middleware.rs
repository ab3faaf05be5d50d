use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;

use super::login::is_locked;
use super::session::session_token_from_headers;
use crate::db::{self as queries, now_timestamp, Session, User};

/// A user authenticated by a session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl CurrentUser {
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.session.csrf_token
    }
}

/// Look up a live session and its user.
///
/// Expired sessions are deleted on sight.
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Option<CurrentUser> {
    let session = match queries::get_session_by_token(pool, token).await {
        Ok(Some(s)) => s,
        Ok(None) => return None,
        Err(e) => {
            tracing::error!("Failed to look up session: {e}");
            return None;
        }
    };

    if session.expires_at < now_timestamp() {
        let _ = queries::delete_session(pool, token).await;
        return None;
    }

    let user = match queries::get_user_by_id(pool, session.user_id).await {
        Ok(Some(u)) => u,
        _ => return None,
    };

    if !user.is_active || is_locked(&user) {
        return None;
    }

    let _ = queries::update_session_last_used(pool, session.id).await;

    Some(CurrentUser { user, session })
}

/// Current authenticated user (if any).
/// Use this extractor when authentication is optional.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);

        let Some(token) = session_token_from_headers(&parts.headers) else {
            return Ok(MaybeUser(None));
        };

        Ok(MaybeUser(resolve_session(&pool, token).await))
    }
}

/// Current authenticated user (required).
/// Anonymous visitors are redirected to the login page, returning here afterwards.
#[derive(Debug, Clone)]
pub struct RequireUser(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;

        match user {
            Some(u) => Ok(RequireUser(u)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
                Err(login_redirect(&next))
            }
        }
    }
}

/// Redirect to the login page with a `next` parameter.
#[must_use]
pub fn login_redirect(next: &str) -> Response {
    Redirect::to(&format!(
        "/users/login/?next={}",
        urlencoding::encode(next)
    ))
    .into_response()
}

/// Accept a post-login redirect target only when it stays on this site.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && !n.chars().any(char::is_control)
    })
}

/// Get client IP address from request headers.
pub fn get_client_ip(parts: &Parts) -> String {
    // Check X-Forwarded-For header (if behind proxy)
    if let Some(forwarded) = parts.headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                return first_ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = parts.headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    "unknown".to_string()
}

/// Get user agent from request.
pub fn get_user_agent(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

/// Client address and user agent, as recorded on new sessions.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo {
            ip: get_client_ip(parts),
            user_agent: get_user_agent(parts),
        })
    }
}
