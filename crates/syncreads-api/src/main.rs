mod auth;
mod config;
mod error;
mod rate_limit;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use syncreads_core::article::{ArticleRenderer, ChromeRenderer};
use syncreads_core::remote::{DeviceConnector, RemarkableConnector};
use syncreads_core::services::DatabaseService;
use syncreads_core::sync::{SyncOptions, SyncRunner};
use tokio_util::sync::CancellationToken;

use config::ApiConfig;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("syncreads=info".parse()?),
        )
        .init();

    let config = Arc::new(ApiConfig::from_env()?);
    tracing::info!("Starting syncreads-api with config: {:?}", config);

    let worker = &config.worker;
    let db_path = worker.database_path.clone().unwrap_or_else(default_db_path);
    let db = DatabaseService::open_path(db_path).await?;
    let renderer: Arc<dyn ArticleRenderer> = Arc::new(ChromeRenderer::new(
        worker.require_chrome_bin()?,
        worker.remote_call_timeout,
    )?);
    let connector: Arc<dyn DeviceConnector> = Arc::new(RemarkableConnector::new(
        &worker.remarkable_auth_url,
        &worker.remarkable_sync_url,
    )?);
    let runner = SyncRunner::new(
        db.clone(),
        connector,
        renderer,
        SyncOptions::from_config(worker),
    );

    let shutdown = CancellationToken::new();
    let state = AppState::new(&config, db, runner, shutdown.clone());
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("syncreads-api listening on {}", config.bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down, cancelling running syncs");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncreads")
        .join("syncreads.db")
}
