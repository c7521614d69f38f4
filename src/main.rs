use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use bio600_scanserver::device::{DeviceDriver, SimulatedDriver};
use bio600_scanserver::state::{AppConfig, AppState};
use bio600_scanserver::web_api::routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::default();
    tracing::info!(bind_addr = %config.bind_addr, "starting BIO600 scan server");

    // Hardware builds swap in the vendor-backed driver here.
    let driver: Arc<dyn DeviceDriver> = Arc::new(SimulatedDriver::new());
    let state = AppState::new(config.clone(), driver);

    if let Err(e) = state.session.init() {
        tracing::warn!(error = %e, "scanner not ready at startup, initialize via the API once connected");
    }

    let app = routes::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.preview.stop();
    state.session.close();
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
    }
}
