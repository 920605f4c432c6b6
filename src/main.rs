use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tracklink::api;
use tracklink::config::{Config, DEFAULT_LOG_FILTER};
use tracklink::geo::{GeoLocator, IpApiLocator};
use tracklink::registry::LinkRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    let geo: Arc<dyn GeoLocator> = Arc::new(IpApiLocator::new(
        &config.geo.provider_url,
        config.geo.timeout(),
    )?);
    info!(
        "🌍 Geolocation via {} (timeout {}ms)",
        config.geo.provider_url, config.geo.timeout_ms
    );

    // One registry for the whole process, shared by every request. Its own
    // deadline only backstops the client timeout.
    let registry = Arc::new(LinkRegistry::new(
        geo,
        config.geo.timeout() + Duration::from_millis(500),
    ));
    let app = api::create_router(registry, config.public_base_url.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Tracking link server listening on http://{}", addr);
    if let Some(ref base) = config.public_base_url {
        info!("   - Tracking URLs issued under {}/track/...", base);
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received, draining connections");
}
