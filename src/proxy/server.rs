//! The broker proxy server.
//!
//! # Responsibilities
//! - Validate configuration and build the broker registry
//! - Bind the client listener and run the accept loop
//! - Run the health checker alongside the listener
//! - Orchestrate graceful shutdown: stop accepting, cancel sessions, close brokers

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::error::ProxyError;
use crate::health::HealthChecker;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::load_balancer::BrokerRegistry;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::routing::ConnectionRouter;

/// How long `stop` waits for live sessions to close.
pub const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

pub struct ProxyServer {
    config: ProxyConfig,
    registry: Arc<BrokerRegistry>,
    router: Arc<ConnectionRouter>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    tasks: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl ProxyServer {
    /// Validate `config` and assemble the server. Nothing is bound or connected yet.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let registry = Arc::new(BrokerRegistry::from_config(&config)?);
        let shutdown = Shutdown::new();
        let router = Arc::new(ConnectionRouter::new(Arc::clone(&registry), shutdown.subscribe()));

        Ok(Self {
            config,
            registry,
            router,
            shutdown,
            tracker: ConnectionTracker::new(),
            tasks: Vec::new(),
            local_addr: None,
        })
    }

    /// Bind the listener and start serving. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, ProxyError> {
        if self.local_addr.is_some() || self.shutdown.is_triggered() {
            return Err(ProxyError::AlreadyStarted);
        }

        let listener = Listener::bind(&self.config).await?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: self.config.listen_endpoint(),
            source,
        })?;

        tracing::info!(
            address = %local_addr,
            strategy = self.registry.strategy_name(),
            brokers = self.registry.brokers().len(),
            "Broker proxy listening"
        );
        for broker in self.registry.brokers().iter().filter(|b| b.is_enabled()) {
            tracing::info!(broker = %broker, weight = broker.weight(), "Broker configured");
        }

        let checker = HealthChecker::new(Arc::clone(&self.registry), self.config.health_check_interval());
        self.tasks.push(tokio::spawn(checker.run(self.shutdown.subscribe())));

        self.tasks.push(tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.router),
            self.tracker.clone(),
            self.shutdown.subscribe(),
        )));

        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Stop accepting, cancel live sessions and release every broker handle.
    pub async fn stop(&mut self) {
        tracing::info!(active_sessions = self.tracker.active_count(), "Shutting down broker proxy");
        self.shutdown.trigger();

        if !self.tracker.wait_for_idle(DRAIN_DEADLINE).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Sessions still open after drain deadline"
            );
        }

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed");
            }
        }

        self.registry.close_all();
        tracing::info!("Broker proxy stopped");
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BrokerRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<ConnectionRouter> {
        &self.router
    }

    /// Client sessions currently open, across all brokers.
    pub fn active_sessions(&self) -> u64 {
        self.tracker.active_count()
    }
}

async fn accept_loop(
    listener: Listener,
    router: Arc<ConnectionRouter>,
    tracker: ConnectionTracker,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            res = listener.accept() => res,
        };

        match accepted {
            Ok((client, peer)) => {
                let guard = tracker.track();
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    let id = guard.id();
                    if let Err(e) = router.route(client, peer, id).await {
                        tracing::debug!(session = %id, peer = %peer, error = %e, "Session ended without a broker");
                    }
                    drop(guard);
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Error accepting client connection");
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                }
            }
        }
    }

    tracing::info!("Accept loop stopped");
}
