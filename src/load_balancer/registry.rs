//! Broker registry.
//!
//! # Responsibilities
//! - Own the static set of brokers built from configuration
//! - Compute the candidate set and apply the configured strategy
//! - (Re)connect brokers, recording the outcome on each broker
//! - Expose session counter mutation

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::config::{BrokerConfig, ConfigError, ProxyConfig, ValidationError};
use crate::error::{ConnectionError, RoutingError};
use crate::load_balancer::{broker::Broker, strategy_for, LoadBalancer};
use crate::observability::metrics;
use crate::resilience::timeouts;

/// Owns every broker and the strategy that picks between them.
#[derive(Debug)]
pub struct BrokerRegistry {
    brokers: Vec<Arc<Broker>>,
    strategy: Box<dyn LoadBalancer>,
    connect_timeout: Duration,
}

impl BrokerRegistry {
    /// Build the registry described by `config`. Fails if no broker is configured.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        if config.brokers.is_empty() {
            return Err(ConfigError::Validation(vec![ValidationError::NoBrokers]));
        }
        Ok(Self::new(
            config.brokers.clone(),
            strategy_for(config.load_balancing),
            config.connection_timeout(),
        ))
    }

    /// Build a registry from explicit parts. Brokers start disconnected.
    pub fn new(configs: Vec<BrokerConfig>, strategy: Box<dyn LoadBalancer>, connect_timeout: Duration) -> Self {
        let mut brokers: Vec<Arc<Broker>> = Vec::with_capacity(configs.len());
        for config in configs {
            if brokers.iter().any(|b| b.config().host == config.host && b.config().port == config.port) {
                tracing::warn!(broker = %config, "Broker listed more than once; each entry is balanced separately");
            }
            brokers.push(Arc::new(Broker::new(config)));
        }

        Self {
            brokers,
            strategy,
            connect_timeout,
        }
    }

    /// Every broker, in configuration order.
    pub fn brokers(&self) -> &[Arc<Broker>] {
        &self.brokers
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Brokers that are enabled and connected right now, in configuration order.
    pub fn candidates(&self) -> Vec<Arc<Broker>> {
        self.brokers.iter().filter(|b| b.is_available()).cloned().collect()
    }

    /// Pick a broker for a new client session.
    ///
    /// With no candidates, every disconnected enabled broker gets exactly one
    /// reconnect attempt (all concurrently) before the set is computed again.
    pub async fn acquire(&self) -> Result<Arc<Broker>, RoutingError> {
        let mut candidates = self.candidates();

        if candidates.is_empty() {
            tracing::warn!("No available brokers found, attempting to reconnect");
            self.reconnect_disconnected().await;
            candidates = self.candidates();
        }

        match self.strategy.select(&candidates) {
            Some(broker) => {
                tracing::trace!(
                    broker = %broker,
                    strategy = self.strategy.name(),
                    candidates = candidates.len(),
                    "Broker selected"
                );
                Ok(broker)
            }
            None => {
                for b in &self.brokers {
                    tracing::debug!(broker = %b, enabled = b.is_enabled(), connected = b.is_connected(), "Broker status");
                }
                Err(RoutingError::NoBrokerAvailable)
            }
        }
    }

    /// Attempt one connect per disconnected, enabled broker and wait for all of them.
    ///
    /// Returns how many brokers were attempted.
    pub async fn reconnect_disconnected(&self) -> usize {
        let targets: Vec<&Arc<Broker>> = self
            .brokers
            .iter()
            .filter(|b| b.is_enabled() && !b.is_connected())
            .collect();

        let attempted = targets.len();
        join_all(targets.into_iter().map(|b| self.connect(b))).await;
        attempted
    }

    /// (Re)connect one broker.
    ///
    /// Any stale handle is closed first. The connect itself runs without the
    /// broker lock held; only the resulting state change takes it, and only if
    /// no newer attempt on the same broker has settled meanwhile. Failures are
    /// logged and recorded on the broker.
    pub async fn connect(&self, broker: &Broker) -> Result<(), ConnectionError> {
        let (attempt, stale) = broker.begin_connect();
        drop(stale);

        match timeouts::connect(broker.config(), self.connect_timeout).await {
            Ok(stream) => {
                match broker.attach(attempt, stream) {
                    Ok(displaced) => {
                        drop(displaced);
                        tracing::info!(broker = %broker, "Connected to broker");
                        metrics::record_broker_connect(&broker.address(), true);
                    }
                    Err(unused) => {
                        drop(unused);
                        tracing::debug!(broker = %broker, "Connect superseded by a newer attempt");
                    }
                }
                Ok(())
            }
            Err(e) => {
                match broker.fail_connect(attempt) {
                    Some(_) => {
                        tracing::error!(broker = %broker, error = %e, "Failed to connect to broker");
                        metrics::record_broker_connect(&broker.address(), false);
                    }
                    None => {
                        tracing::debug!(broker = %broker, error = %e, "Stale connect attempt failed; newer outcome kept");
                    }
                }
                Err(e)
            }
        }
    }

    pub fn increment_sessions(&self, broker: &Broker) -> usize {
        broker.increment_sessions()
    }

    pub fn decrement_sessions(&self, broker: &Broker) -> usize {
        broker.decrement_sessions()
    }

    /// Close every held broker handle. Used at shutdown.
    pub fn close_all(&self) {
        for broker in &self.brokers {
            let (was_connected, handle) = broker.detach();
            drop(handle);
            if was_connected {
                tracing::debug!(broker = %broker, "Broker connection closed");
                metrics::record_broker_up(&broker.address(), false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadBalancingKind;
    use crate::load_balancer::RoundRobin;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(2);

    async fn listening() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn closed_port() -> u16 {
        let (listener, port) = listening().await;
        drop(listener);
        port
    }

    fn registry(configs: Vec<BrokerConfig>) -> BrokerRegistry {
        BrokerRegistry::new(configs, Box::new(RoundRobin::new()), TIMEOUT)
    }

    #[test]
    fn from_config_requires_brokers() {
        let err = BrokerRegistry::from_config(&ProxyConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e == &[ValidationError::NoBrokers]));

        let mut config = ProxyConfig::default();
        config.load_balancing = LoadBalancingKind::LeastConnections;
        config.brokers.push(BrokerConfig::new("127.0.0.1", 9092));
        let registry = BrokerRegistry::from_config(&config).unwrap();
        assert_eq!(registry.strategy_name(), "least_connections");
        assert_eq!(registry.brokers().len(), 1);
    }

    #[tokio::test]
    async fn acquire_connects_lazily() {
        let (_l1, p1) = listening().await;
        let (_l2, p2) = listening().await;
        let registry = registry(vec![BrokerConfig::new("127.0.0.1", p1), BrokerConfig::new("127.0.0.1", p2)]);
        assert!(registry.candidates().is_empty());

        let first = registry.acquire().await.unwrap();
        assert_eq!(first.config().port, p1);
        assert_eq!(registry.candidates().len(), 2);
        assert!(registry.brokers().iter().all(|b| b.transport().is_some()));

        // Stable set: plain rotation, no further connects.
        let second = registry.acquire().await.unwrap();
        assert_eq!(second.config().port, p2);
        assert!(registry.brokers().iter().all(|b| b.connect_attempts() == 1));
    }

    #[tokio::test]
    async fn all_disabled_yields_no_broker_without_attempts() {
        let (_l, port) = listening().await;
        let registry = registry(vec![BrokerConfig::new("127.0.0.1", port).disabled()]);

        let err = registry.acquire().await.unwrap_err();
        assert!(matches!(err, RoutingError::NoBrokerAvailable));
        assert_eq!(registry.brokers()[0].connect_attempts(), 0);
    }

    #[tokio::test]
    async fn all_unreachable_tries_each_exactly_once() {
        let registry = registry(vec![
            BrokerConfig::new("127.0.0.1", closed_port().await),
            BrokerConfig::new("127.0.0.1", closed_port().await),
            BrokerConfig::new("127.0.0.1", closed_port().await).disabled(),
        ]);

        let outcome = tokio::time::timeout(Duration::from_secs(5), registry.acquire()).await;
        assert!(matches!(outcome, Ok(Err(RoutingError::NoBrokerAvailable))));

        let attempts: Vec<u64> = registry.brokers().iter().map(|b| b.connect_attempts()).collect();
        assert_eq!(attempts, vec![1, 1, 0]);
        assert!(registry.brokers().iter().all(|b| !b.is_connected() && b.transport().is_none()));
    }

    #[tokio::test]
    async fn unreachable_broker_is_skipped_once_another_connects() {
        let (_l, good) = listening().await;
        let registry = registry(vec![
            BrokerConfig::new("127.0.0.1", closed_port().await),
            BrokerConfig::new("127.0.0.1", good),
        ]);

        for _ in 0..4 {
            assert_eq!(registry.acquire().await.unwrap().config().port, good);
        }
        assert_eq!(registry.brokers()[0].connect_attempts(), 1);
    }

    #[tokio::test]
    async fn close_all_releases_handles() {
        let (_l, port) = listening().await;
        let registry = registry(vec![BrokerConfig::new("127.0.0.1", port)]);
        registry.connect(&registry.brokers()[0]).await.unwrap();
        assert!(registry.brokers()[0].is_connected());

        registry.close_all();
        assert!(!registry.brokers()[0].is_connected());
        assert!(registry.brokers()[0].transport().is_none());
    }

    #[tokio::test]
    async fn session_counter_via_registry() {
        let registry = registry(vec![BrokerConfig::new("127.0.0.1", 9092)]);
        let broker = Arc::clone(&registry.brokers()[0]);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let broker = Arc::clone(&broker);
                tokio::spawn(async move {
                    for _ in 0..100 {
                        broker.increment_sessions();
                        tokio::task::yield_now().await;
                        broker.decrement_sessions();
                    }
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }

        assert_eq!(registry.increment_sessions(&broker), 1);
        assert_eq!(registry.decrement_sessions(&broker), 0);
        assert_eq!(registry.decrement_sessions(&broker), 0);
    }
}
