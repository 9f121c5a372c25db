use anyhow::Context;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use confab_server::config::ServerConfig;
use confab_server::room::RoomRegistry;
use confab_server::sfu::MediasoupSfu;
use confab_server::signaling::{ws_handler, GatewayState, SignalingService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();

    let sfu = Arc::new(
        MediasoupSfu::new(&config)
            .await
            .context("media engine startup failed")?,
    );
    let service = SignalingService::new();
    let registry = RoomRegistry::new(sfu.clone(), Arc::new(service.clone()));

    let state = GatewayState { service, registry };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state);

    let addr = SocketAddr::new(config.bind_addr, config.http_port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Signaling endpoint listening on ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    sfu.shutdown().await;
    info!("Orderly shutdown complete");
    Ok(())
}
