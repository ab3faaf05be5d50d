//! API authentication: `Authorization: Token <key>` or the web session cookie.
//!
//! Session-authenticated requests with unsafe methods must echo the session's
//! CSRF token in the `X-CSRF-Token` header.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use sqlx::SqlitePool;

use super::error::ApiError;
use crate::auth::{
    parse_token_header, resolve_session, session_token_from_headers, verify_csrf_token,
    CSRF_HEADER,
};
use crate::db::{self as queries, User};
use crate::permissions::is_safe_method;

/// Authenticated API caller, if any.
#[derive(Debug, Clone)]
pub struct MaybeApiUser(pub Option<User>);

/// Authenticated API caller (required).
#[derive(Debug, Clone)]
pub struct RequireApiUser(pub User);

async fn authenticate_parts(parts: &Parts, pool: &SqlitePool) -> Result<Option<User>, ApiError> {
    if let Some(value) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        let is_token_scheme = value
            .split_whitespace()
            .next()
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("token"));
        if is_token_scheme {
            let key = parse_token_header(value).ok_or(ApiError::InvalidToken)?;
            let user = queries::get_user_by_api_token(pool, key)
                .await?
                .filter(|u| u.is_active)
                .ok_or(ApiError::InvalidToken)?;
            return Ok(Some(user));
        }
    }

    let Some(token) = session_token_from_headers(&parts.headers) else {
        return Ok(None);
    };
    let Some(current) = resolve_session(pool, token).await else {
        return Ok(None);
    };

    if !is_safe_method(&parts.method) {
        let submitted = parts
            .headers
            .get(CSRF_HEADER)
            .and_then(|h| h.to_str().ok());
        if !verify_csrf_token(current.csrf_token(), submitted) {
            tracing::warn!(user_id = current.user.id, "API CSRF token mismatch");
            return Err(ApiError::Csrf);
        }
    }

    Ok(Some(current.user))
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeApiUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);
        Ok(MaybeApiUser(authenticate_parts(parts, &pool).await?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequireApiUser
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);
        authenticate_parts(parts, &pool)
            .await?
            .map(RequireApiUser)
            .ok_or(ApiError::Unauthorized)
    }
}
