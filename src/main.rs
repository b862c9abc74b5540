//! Broker proxy binary.
//!
//! Loads configuration (file, then `BROKER_PROXY_*` environment variables, then
//! command-line flags), installs logging and runs the proxy until SIGINT/SIGTERM.

use std::path::PathBuf;

use clap::Parser;

use broker_proxy::config::{apply_env_overrides, load_config, ConfigError, ProxyConfig};
use broker_proxy::lifecycle::startup;
use broker_proxy::observability::logging;
use broker_proxy::LoadBalancingKind;

#[derive(Parser)]
#[command(name = "broker-proxy")]
#[command(version, about = "Layer-4 load-balancing relay for a broker cluster", long_about = None)]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    listen_address: Option<String>,

    /// Override the listen port
    #[arg(long)]
    listen_port: Option<u16>,

    /// Override the load balancing strategy
    #[arg(long)]
    strategy: Option<LoadBalancingKind>,

    /// Override the log level
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(address) = &self.listen_address {
            config.listen_address = address.clone();
        }
        if let Some(port) = self.listen_port {
            config.listen_port = port;
        }
        if let Some(strategy) = self.strategy {
            config.load_balancing = strategy;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => load_config(path),
        None => Ok(ProxyConfig::default()),
    }
    .and_then(|mut config| {
        apply_env_overrides(&mut config)?;
        Ok::<_, ConfigError>(config)
    });

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            let mut fallback = ProxyConfig::default();
            cli.apply(&mut fallback);
            logging::init(&fallback.observability);
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    cli.apply(&mut config);
    logging::init(&config.observability);

    if let Err(e) = startup::run(config).await {
        tracing::error!(error = %e, "Broker proxy failed");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
