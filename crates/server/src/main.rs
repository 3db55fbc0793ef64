use std::path::PathBuf;

use taskboard_config::ServerConfig;
use taskboard_server::{AppState, build_router, storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard_server=info,tower_http=info".into()),
        )
        .init();

    let config_path = ServerConfig::default_path();
    let config = ServerConfig::load(&config_path)?;
    tracing::info!("configuration: {}", config_path.display());

    if !config.auth_enabled() {
        tracing::warn!("JWT_SECRET not set, login and authenticated endpoints are disabled");
    }

    let data_dir = PathBuf::from(&config.storage.data_dir);
    tracing::info!("data directory: {}", data_dir.display());
    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    let bind = config.server.bind.clone();
    let base_url = config.server.base_url.clone();
    let app = build_router(AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("listening on {bind} ({base_url})");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
