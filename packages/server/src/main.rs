use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::storage::filesystem::FilesystemImageStore;
use feed_server::config::AppConfig;
use feed_server::state::AppState;
use feed_server::utils::jwt::TokenService;
use feed_server::{build_router, database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    if config.auth.jwt_secret.trim().is_empty() {
        bail!("auth.jwt_secret must be set (e.g. FEED__AUTH__JWT_SECRET)");
    }

    let db = database::init_db(&config.database)
        .await
        .context("Failed to connect to database")?;
    seed::ensure_indexes(&db).await?;

    let images = FilesystemImageStore::new(config.upload.dir.clone(), config.upload.max_size)
        .await
        .with_context(|| format!("Failed to prepare upload dir {:?}", config.upload.dir))?;
    info!("Profile images stored under {:?}", config.upload.dir);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host/server.port")?;

    let state = AppState {
        db,
        tokens: Arc::new(TokenService::from_config(&config.auth)),
        images: Arc::new(images),
        http: reqwest::Client::new(),
        config,
    };

    let app = build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
