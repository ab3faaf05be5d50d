//! JSON API mounted under `/api`.

mod blogs;
pub mod error;
mod extract;
mod images;
mod pagination;
mod posts;
mod profiles;
mod users;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use super::multipart::{MultipartForm, UploadedFile};
use super::{profile_id_of, AppState};
use crate::db::{self as queries, User};
pub use error::ApiError;
pub use extract::{MaybeApiUser, RequireApiUser};
pub use pagination::{Page, PageRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/users/", get(users::list).post(users::create))
        .route("/auth/token/login/", post(users::token_login))
        .route("/auth/token/logout/", post(users::token_logout))
        .route(
            "/user/:id/",
            get(users::detail)
                .put(users::update)
                .patch(users::update)
                .delete(users::destroy),
        )
        .route("/profiles/", get(profiles::list))
        .route("/new-profile/", post(profiles::create))
        .route(
            "/profile/:id/",
            get(profiles::detail)
                .put(profiles::update)
                .patch(profiles::update),
        )
        .route("/new-blog/", post(blogs::create))
        .route("/blogs/", get(blogs::list))
        .route(
            "/blog/:id/",
            get(blogs::detail)
                .put(blogs::update)
                .patch(blogs::update)
                .delete(blogs::destroy),
        )
        .route("/new-post/", post(posts::create))
        .route("/posts/", get(posts::list))
        .route(
            "/post/:id/",
            get(posts::detail)
                .put(posts::update)
                .patch(posts::update)
                .delete(posts::destroy),
        )
        .route("/new-image/", post(images::create))
        .route(
            "/image/:id/",
            get(images::detail)
                .put(images::update)
                .patch(images::update)
                .delete(images::destroy),
        )
}

/// Absolute URL of a path on this site.
pub(crate) fn absolute_url(state: &AppState, path: &str) -> String {
    format!("{}{path}", state.config.base_url.trim_end_matches('/'))
}

/// The caller's profile id, if they have one.
pub(crate) async fn caller_profile(pool: &SqlitePool, user: &User) -> Result<Option<i64>, ApiError> {
    Ok(profile_id_of(pool, user.id).await?)
}

/// The caller's profile id, creating an empty profile when missing.
pub(crate) async fn ensure_caller_profile(pool: &SqlitePool, user: &User) -> Result<i64, ApiError> {
    match profile_id_of(pool, user.id).await? {
        Some(id) => Ok(id),
        None => Ok(queries::create_profile(pool, user.id).await?),
    }
}

/// The `page` parameter shared by every listing.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// JSON body extractor whose rejections render as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// A write payload sent either as a JSON object or as multipart form data.
#[derive(Debug)]
pub enum ApiInput {
    Json(Map<String, Value>),
    Multipart(MultipartForm),
}

#[async_trait]
impl<S> FromRequest<S> for ApiInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            if body.is_empty() {
                return Ok(Self::Json(Map::new()));
            }
            return serde_json::from_slice(&body)
                .map(Self::Json)
                .map_err(|e| ApiError::BadRequest(format!("JSON parse error - {e}")));
        }

        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            return Ok(Self::Multipart(MultipartForm::read(multipart).await?));
        }

        let ApiJson(map) = ApiJson::<Map<String, Value>>::from_request(req, state).await?;
        Ok(Self::Json(map))
    }
}

impl ApiInput {
    /// A field as text. JSON numbers and booleans are stringified; `null` reads as empty.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        match self {
            Self::Json(map) => map.get(name).map(|value| match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            }),
            Self::Multipart(form) => form.text(name).map(ToString::to_string),
        }
    }

    /// Whether a field was explicitly cleared (`null` or an empty string).
    #[must_use]
    pub fn is_cleared(&self, name: &str) -> bool {
        match self {
            Self::Json(map) => matches!(map.get(name), Some(Value::Null))
                || matches!(map.get(name), Some(Value::String(s)) if s.is_empty()),
            Self::Multipart(form) => form.text(name).is_some_and(str::is_empty),
        }
    }

    /// An uploaded file; JSON payloads carry none.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        match self {
            Self::Json(_) => None,
            Self::Multipart(form) => form.file(name),
        }
    }
}

/// Parse a primary-key field.
pub(crate) fn parse_id(value: &str) -> Result<i64, String> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| "Incorrect type. Expected pk value.".to_string())
}
