use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

use super::{maybe_viewer, pages, AppState, WebError};
use crate::auth::MaybeUser;
use crate::db::get_latest_published_posts;

/// Posts shown on the home page and in the feed.
pub const LATEST_POSTS_COUNT: i64 = 5;

/// Site-wide pages.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::permanent("/main/") }))
        .route("/main/", get(index))
        .route("/main/about/", get(about))
        .route("/main/contacts/", get(contacts))
        .route("/blogs/", get(|| async { Redirect::to("/blogs/posts-latest/") }))
        .route("/healthz", get(health))
        .route("/media/*path", get(serve_media))
}

async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Response, WebError> {
    let posts = get_latest_published_posts(state.db.pool(), LATEST_POSTS_COUNT, 0).await?;
    let viewer = maybe_viewer(state.db.pool(), user.as_ref()).await;
    Ok(Html(pages::index_page(viewer.as_ref(), &posts).into_string()).into_response())
}

async fn about(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    let viewer = maybe_viewer(state.db.pool(), user.as_ref()).await;
    Html(pages::about_page(viewer.as_ref()).into_string()).into_response()
}

async fn contacts(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    let viewer = maybe_viewer(state.db.pool(), user.as_ref()).await;
    Html(pages::contacts_page(viewer.as_ref()).into_string()).into_response()
}

async fn health(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => "OK".into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable").into_response()
        }
    }
}

/// Serve an uploaded file. Names are content hashes and never change.
async fn serve_media(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let Some(full_path) = state.media.resolve(&path) else {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    };
    let is_file = tokio::fs::metadata(&full_path)
        .await
        .is_ok_and(|meta| meta.is_file());
    if !is_file {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    }

    let content = match tokio::fs::read(&full_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(path = %path, "Failed to read media file: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response();
        }
    };

    let content_type = mime_guess::from_path(&full_path)
        .first_or_octet_stream()
        .to_string();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        content,
    )
        .into_response()
}
