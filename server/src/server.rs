use std::net::SocketAddr;

use color_eyre::eyre::WrapErr as _;
use tracing::info;

use crate::state::ServerConfig;

/// Serve `app` until the process receives Ctrl-C
pub async fn run_server(config: ServerConfig, app: axum::Router) -> color_eyre::Result<()> {
    let addr = format!("{}:{}", config.host, config.port)
        .parse::<SocketAddr>()
        .wrap_err("HOST and PORT do not form a valid socket address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {addr}"))?;

    info!("Auth gateway listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {:?}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
