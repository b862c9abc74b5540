//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics exporter when enabled
//! - Build and start the proxy server
//! - Block until a termination signal, then stop the server
//!
//! Logging is installed by the caller before this runs so that configuration
//! errors are reported through it too.

use std::net::SocketAddr;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::proxy::ProxyServer;

/// Run the proxy until SIGINT/SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen_endpoint(),
        strategy = %config.load_balancing,
        connection_timeout_ms = config.connection_timeout_ms,
        health_check_interval_ms = config.health_check_interval_ms,
        "Starting broker proxy"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut server = ProxyServer::new(config)?;
    server.start().await?;

    if let Err(e) = shutdown_signal().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    server.stop().await;
    Ok(())
}
