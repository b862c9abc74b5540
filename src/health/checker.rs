//! Periodic broker health checking.
//!
//! # Responsibilities
//! - Every `health_check_interval`, check every enabled broker concurrently
//! - Reconnect disconnected brokers
//! - Probe connected brokers and drop the ones whose connection died
//!
//! A round always finishes (or is abandoned on shutdown) before the next tick
//! is scheduled, so rounds never overlap.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::probe::probe;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::{Broker, BrokerRegistry, LinkState};
use crate::observability::metrics;

/// Upper bound on how long a probe waits for a socket to show readiness.
pub const DEFAULT_PROBE_WINDOW: Duration = Duration::from_millis(50);

/// Result of checking one broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Connected and the probe passed.
    Alive,
    /// Was disconnected; connect succeeded.
    Reconnected,
    /// Was connected; the probe failed and the broker is now disconnected.
    Lost,
    /// Was disconnected; connect failed again.
    Unreachable,
    /// Another connect of this broker is in flight; left alone this round.
    Connecting,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Alive => "alive",
            CheckOutcome::Reconnected => "reconnected",
            CheckOutcome::Lost => "lost",
            CheckOutcome::Unreachable => "unreachable",
            CheckOutcome::Connecting => "connecting",
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, CheckOutcome::Alive | CheckOutcome::Reconnected)
    }
}

pub struct HealthChecker {
    registry: Arc<BrokerRegistry>,
    interval: Duration,
    probe_window: Duration,
}

impl HealthChecker {
    pub fn new(registry: Arc<BrokerRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            probe_window: DEFAULT_PROBE_WINDOW.min(interval),
        }
    }

    pub fn with_probe_window(mut self, window: Duration) -> Self {
        self.probe_window = window;
        self
    }

    /// Run rounds until `shutdown` fires. The first round starts one interval in.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            brokers = self.registry.brokers().len(),
            "Health checker starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                _ = self.check_all() => {}
                _ = shutdown.recv() => {
                    tracing::debug!("Abandoning in-flight health checks");
                    break;
                }
            }
        }

        tracing::info!("Health checker received shutdown signal, exiting loop");
    }

    /// Check every enabled broker concurrently and wait for all of them.
    pub async fn check_all(&self) -> Vec<(Arc<Broker>, CheckOutcome)> {
        let checks = self
            .registry
            .brokers()
            .iter()
            .filter(|b| b.is_enabled())
            .map(|broker| async move { (Arc::clone(broker), self.check_broker(broker).await) });

        let results = join_all(checks).await;

        let up = results.iter().filter(|(_, outcome)| outcome.is_up()).count();
        tracing::debug!(checked = results.len(), up, "Health check round complete");
        results
    }

    /// Check a single broker. Failures are recorded on the broker, never returned.
    pub async fn check_broker(&self, broker: &Broker) -> CheckOutcome {
        let outcome = match broker.link_state() {
            LinkState::Connecting => {
                tracing::trace!(broker = %broker, "Connect already in flight, skipping");
                CheckOutcome::Connecting
            }
            LinkState::Disconnected => match self.registry.connect(broker).await {
                Ok(()) => CheckOutcome::Reconnected,
                Err(_) => CheckOutcome::Unreachable,
            },
            LinkState::Ready(stream) => match probe(&stream, self.probe_window).await {
                Ok(()) => {
                    broker.touch();
                    tracing::trace!(broker = %broker, "Health check passed");
                    CheckOutcome::Alive
                }
                Err(e) => {
                    // A concurrent reconnect may already have replaced this handle.
                    if let Some(dead) = broker.detach_stale(&stream) {
                        drop(dead);
                        tracing::warn!(broker = %broker, error = %e, "Health check failed, broker marked disconnected");
                        metrics::record_broker_up(&broker.address(), false);
                    }
                    CheckOutcome::Lost
                }
            },
        };

        metrics::record_health_check(&broker.address(), outcome.as_str());
        outcome
    }
}
