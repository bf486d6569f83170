use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatekeeper_service::{build_router, AppState, GatekeeperConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatekeeperConfig::from_env()?;
    let addr = config.socket_addr()?;
    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    info!(%addr, "starting gatekeeper-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
