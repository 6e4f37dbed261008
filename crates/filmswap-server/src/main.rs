use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use filmswap_core::SwapService;
use filmswap_db::{Database, SqliteBackup};
use filmswap_server::config::Config;
use filmswap_server::dispatcher::Dispatcher;
use filmswap_server::{AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "filmswap=debug,filmswap_server=debug,filmswap_core=debug,filmswap_db=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and backups
    let db = Database::open(&config.db_path)?;
    let backups = SqliteBackup::new(config.backup_dir.clone())?;
    info!("Ban policy: {:?}", config.swap.ban_policy);

    let dispatcher = Dispatcher::new();
    let service = SwapService::new(
        db,
        Arc::new(dispatcher.clone()),
        Arc::new(backups),
        config.swap.clone(),
    );

    let state = AppState {
        service: Arc::new(service),
        dispatcher,
        operator_token: config.operator_token.clone().into(),
        command_token: config.command_token.clone().into(),
    };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Film swap server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
