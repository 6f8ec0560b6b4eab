//! Price oracle
//!
//! Main entry point: poller plus HTTP server

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use oracle_api_server::{ApiServerBuilder, AppState};
use oracle_core::OracleConfig;
use oracle_price_feed::{
    default_sources, http_client, AggregatorConfig, PriceAggregator, PricePoller,
    PrometheusMetrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = OracleConfig::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    info!("Starting price oracle v{}", env!("CARGO_PKG_VERSION"));

    let client = http_client()?;
    let sources = default_sources(&client, &config.sources);
    let metrics = Arc::new(PrometheusMetrics::new()?);

    let aggregator = Arc::new(
        PriceAggregator::new(AggregatorConfig::from(&config), sources)
            .with_metrics(metrics.clone()),
    );

    let shutdown = CancellationToken::new();
    let poller = PricePoller::new(Arc::clone(&aggregator), config.poll_interval)
        .spawn(shutdown.clone());

    // Spawn shutdown signal handler
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        signal_token.cancel();
    });

    let server = ApiServerBuilder::new()
        .host(config.host.clone())
        .port(config.port)
        .build(AppState::new(aggregator.state(), metrics));

    info!("Press Ctrl+C to shutdown");

    if let Err(e) = server.start_with_shutdown(shutdown.clone()).await {
        error!("Server error: {}", e);
        shutdown.cancel();
        let _ = poller.await;
        return Err(e);
    }

    if let Err(e) = poller.await {
        error!("Poller task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
