use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use just_blog::auth::{ensure_admin, run_cleanup_worker};
use just_blog::config::Config;
use just_blog::db::Database;
use just_blog::web::{self, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting just-blog");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        base_url = %config.base_url,
        database = %config.database_path.display(),
        "Configuration loaded"
    );

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    info!("Database initialized");

    if let (Some(username), Some(password)) = (
        config.admin_username.as_deref(),
        config.admin_password.as_deref(),
    ) {
        ensure_admin(db.pool(), username, password)
            .await
            .context("Failed to create admin account")?;
    }

    let cleanup_interval = config.session_cleanup_interval;
    let state = AppState::new(db.clone(), config);
    state
        .media
        .ensure_dirs()
        .await
        .context("Failed to create media directories")?;

    let shutdown = CancellationToken::new();

    let cleanup_handle = tokio::spawn(run_cleanup_worker(
        db.pool().clone(),
        cleanup_interval,
        shutdown.clone(),
    ));

    let web_shutdown = shutdown.clone();
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web::serve(state, web_shutdown).await {
            error!("Web server error: {e:#}");
        }
    });

    shutdown_signal().await;

    info!("Shutting down...");
    shutdown.cancel();

    if let Err(e) = web_handle.await {
        error!("Web server task failed: {e}");
    }
    if let Err(e) = cleanup_handle.await {
        error!("Cleanup task failed: {e}");
    }

    db.pool().close().await;
    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,just_blog=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
