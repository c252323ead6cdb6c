use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing::info;

use cafe_platform as cafe;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = cafe::config::load_config()?;
    cafe::config::init_tracing(cfg.log_level(), cfg.log_json);

    let clients = cafe::grpc::client::GatewayClients::connect_lazy(&cfg.grpc)
        .context("failed to configure upstream gRPC clients")?;

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid gateway address {}:{}", cfg.host, cfg.port))?;

    let state = cafe::AppState {
        clients,
        config: Arc::new(cfg),
    };
    let app = cafe::app(state);

    info!("cafe-gateway listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(cafe::shutdown_signal())
        .await?;

    info!("cafe-gateway stopped");
    Ok(())
}
