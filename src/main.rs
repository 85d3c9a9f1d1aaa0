// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

use crate::application::device_service::DeviceService;
use crate::application::fetch_coordinator::FetchCoordinator;
use crate::application::multidevice_service::MultideviceService;
use crate::application::sample_source::SampleSource;
use crate::domain::sample::{KeyGranularity, LookbackWindow};
use crate::infrastructure::config::{load_devices_config, load_influx_config, load_server_config};
use crate::infrastructure::influx_repository::InfluxHistoryStore;
use crate::presentation::app_state::AppState;
use crate::presentation::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let server = load_server_config()
        .context("Failed to load server configuration")?
        .server;
    let influx_config = load_influx_config().context("Failed to load InfluxDB configuration")?;
    let devices = load_devices_config()
        .context("Failed to load device configuration")?
        .devices;

    let granularity = KeyGranularity::from_secs(server.key_granularity_secs)?;
    let default_window = LookbackWindow::from_hours(server.default_window_hours)?;

    // Create sample source (infrastructure layer)
    let source: Arc<dyn SampleSource> =
        Arc::new(InfluxHistoryStore::new(influx_config.influx, &devices));

    // Create services (application layer)
    let fetch_timeout = Duration::from_secs(server.fetch_timeout_secs);
    let coordinator =
        FetchCoordinator::new(source.clone(), server.pool_size, fetch_timeout, granularity);
    let device_service = DeviceService::new(source, devices, coordinator.pool(), fetch_timeout);
    let multidevice_service = MultideviceService::new(coordinator);

    // Create application state
    let state = Arc::new(AppState {
        multidevice_service,
        device_service,
        default_window_hours: default_window.hours(),
    });

    // Build router (presentation layer)
    let router = router(state);

    // Start server
    let addr: SocketAddr = server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", server.bind_addr))?;
    tracing::info!("Starting home-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
