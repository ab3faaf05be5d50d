mod api;
mod auth;
mod blogs;
pub mod error;
mod feeds;
pub mod forms;
pub mod multipart;
pub mod pages;
mod routes;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::Router;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{verify_csrf_token, CurrentUser};
use crate::components::Viewer;
use crate::config::Config;
use crate::db::{self as queries, Database};
use crate::media::MediaStorage;

pub use error::WebError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub media: MediaStorage,
}

impl AppState {
    #[must_use]
    pub fn new(db: Database, config: Config) -> Self {
        let media = MediaStorage::new(&config.media_dir);
        Self {
            db,
            config: Arc::new(config),
            media,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.db.pool().clone()
    }
}

/// Start the web server and run until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .context("Web server error")?;

    info!("Web server stopped");
    Ok(())
}

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    let static_dir = find_static_dir(&state.config.static_dir);
    info!(static_dir = ?static_dir, media_dir = ?state.media.root(), "Serving files");

    Router::new()
        .merge(routes::router())
        .merge(auth::router())
        .merge(blogs::router())
        .merge(feeds::router())
        .nest("/api", api::router())
        .nest_service("/static", ServeDir::new(&static_dir))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Find the static files directory.
///
/// Uses the configured directory when present, then `/usr/share/just-blog/static`.
fn find_static_dir(configured: &Path) -> PathBuf {
    let candidates = [
        configured.to_path_buf(),
        PathBuf::from("/usr/share/just-blog/static"),
    ];

    for path in &candidates {
        if path.is_dir() {
            return path.clone();
        }
    }

    configured.to_path_buf()
}

/// Navigation data for a signed-in visitor.
pub async fn viewer_for(pool: &SqlitePool, current: &CurrentUser) -> Viewer {
    let profile_id = match queries::get_profile_by_user(pool, current.user.id).await {
        Ok(profile) => profile.map(|p| p.id),
        Err(e) => {
            tracing::warn!("Failed to load profile for navigation: {e}");
            None
        }
    };

    Viewer {
        user: current.user.clone(),
        profile_id,
        csrf_token: current.csrf_token().to_string(),
    }
}

/// Navigation data for an optional visitor.
pub async fn maybe_viewer(pool: &SqlitePool, current: Option<&CurrentUser>) -> Option<Viewer> {
    match current {
        Some(c) => Some(viewer_for(pool, c).await),
        None => None,
    }
}

/// Reject a state-changing form whose token does not match the session.
pub fn check_csrf(current: &CurrentUser, submitted: Option<&str>) -> Result<(), WebError> {
    if verify_csrf_token(current.csrf_token(), submitted) {
        Ok(())
    } else {
        tracing::warn!(user_id = current.user.id, "CSRF token mismatch");
        Err(WebError::Csrf)
    }
}

/// The caller's profile id, if the profile exists.
pub async fn profile_id_of(pool: &SqlitePool, user_id: i64) -> anyhow::Result<Option<i64>> {
    Ok(queries::get_profile_by_user(pool, user_id).await?.map(|p| p.id))
}

/// Delete stored files that no image or avatar points at any more.
pub async fn release_media(state: &AppState, files: &[String]) {
    let pool = state.db.pool();
    for file in files {
        state
            .media
            .release(file, || queries::media_file_in_use(pool, file))
            .await;
    }
}
