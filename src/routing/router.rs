//! Per-client connection routing.
//!
//! # Responsibilities
//! - Acquire a broker for each accepted client
//! - Open a dedicated upstream connection for the session
//! - Run both forwarding directions until the first one stops
//! - Keep the broker's session count paired on every exit path
//!
//! # Design Decisions
//! - The session ends as soon as either direction ends. The other direction
//!   is cancelled, not drained and not half-closed, so bytes still in flight
//!   on it are dropped.
//! - No cap on concurrent sessions and no upstream connection reuse.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::task::JoinError;

use crate::error::{ForwardError, RoutingError};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::load_balancer::{Broker, BrokerRegistry, SessionGuard};
use crate::net::connection::ConnectionId;
use crate::net::pipe::{self, Direction, PipeReport};
use crate::observability::metrics;
use crate::resilience::timeouts;

/// Why a routed session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// This direction reached EOF first.
    Closed(Direction),
    /// This direction failed first.
    Failed(Direction),
    /// The proxy is shutting down.
    Shutdown,
}

/// What happened during one routed session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: ConnectionId,
    pub broker: String,
    pub end: SessionEnd,
    pub bytes_to_broker: u64,
    pub bytes_to_client: u64,
    pub duration: Duration,
}

/// Routes accepted clients to brokers.
pub struct ConnectionRouter {
    registry: Arc<BrokerRegistry>,
    connect_timeout: Duration,
    shutdown: ShutdownSignal,
}

impl ConnectionRouter {
    pub fn new(registry: Arc<BrokerRegistry>, shutdown: ShutdownSignal) -> Self {
        let connect_timeout = registry.connect_timeout();
        Self {
            registry,
            connect_timeout,
            shutdown,
        }
    }

    pub fn registry(&self) -> &Arc<BrokerRegistry> {
        &self.registry
    }

    /// Serve one client for its whole lifetime.
    ///
    /// The client socket is closed before this returns, whatever the outcome.
    pub async fn route(
        &self,
        client: TcpStream,
        peer: SocketAddr,
        id: ConnectionId,
    ) -> Result<SessionSummary, RoutingError> {
        tracing::info!(session = %id, peer = %peer, "New client connection");

        let mut shutdown = self.shutdown.clone();

        let acquired = tokio::select! {
            biased;
            _ = shutdown.recv() => None,
            res = self.registry.acquire() => Some(res),
        };
        let broker = match acquired {
            Some(Ok(broker)) => broker,
            Some(Err(e)) => {
                tracing::error!(session = %id, peer = %peer, error = %e, "No available brokers for client connection");
                metrics::record_routing_failure("no_broker");
                drop(client);
                return Err(e);
            }
            None => return Err(cancelled(client, peer, id)),
        };

        let connected = tokio::select! {
            biased;
            _ = shutdown.recv() => None,
            res = timeouts::connect(broker.config(), self.connect_timeout) => Some(res),
        };
        let upstream = match connected {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                tracing::error!(session = %id, peer = %peer, broker = %broker, error = %e, "Failed to open upstream connection");
                metrics::record_routing_failure("upstream_connect");
                drop(client);
                return Err(e.into());
            }
            None => return Err(cancelled(client, peer, id)),
        };

        let session = ActiveSession::begin(&broker);
        tracing::info!(
            session = %id,
            peer = %peer,
            broker = %broker,
            active_sessions = broker.active_sessions(),
            "Routing client to broker"
        );

        let relayed = self.relay(client, upstream, id).await;
        let duration = session.finish();

        let summary = SessionSummary {
            id,
            broker: broker.address(),
            end: relayed.end,
            bytes_to_broker: relayed.bytes_to_broker,
            bytes_to_client: relayed.bytes_to_client,
            duration,
        };

        tracing::info!(
            session = %id,
            peer = %peer,
            broker = %broker,
            end = ?summary.end,
            bytes_to_broker = summary.bytes_to_broker,
            bytes_to_client = summary.bytes_to_client,
            duration_ms = duration.as_millis() as u64,
            "Client connection closed"
        );

        Ok(summary)
    }

    /// Run both directions; stop everything when the first one ends.
    async fn relay(&self, client: TcpStream, upstream: TcpStream, id: ConnectionId) -> Relayed {
        let (client_read, client_write) = client.into_split();
        let (broker_read, broker_write) = upstream.into_split();

        // Dropping `cancel` (e.g. if this future is dropped) also stops both pipes.
        let cancel = Shutdown::new();
        let mut to_broker = tokio::spawn(pipe::forward(
            client_read,
            broker_write,
            cancel.subscribe(),
            Direction::ClientToBroker,
        ));
        let mut to_client = tokio::spawn(pipe::forward(
            broker_read,
            client_write,
            cancel.subscribe(),
            Direction::BrokerToClient,
        ));

        let mut shutdown = self.shutdown.clone();
        let first = tokio::select! {
            res = &mut to_broker => Some((Direction::ClientToBroker, joined(Direction::ClientToBroker, res))),
            res = &mut to_client => Some((Direction::BrokerToClient, joined(Direction::BrokerToClient, res))),
            _ = shutdown.recv() => None,
        };

        cancel.trigger();

        let (end, to_broker, to_client) = match first {
            Some((Direction::ClientToBroker, res)) => {
                let other = joined(Direction::BrokerToClient, to_client.await);
                (ended(Direction::ClientToBroker, &res), res, other)
            }
            Some((Direction::BrokerToClient, res)) => {
                let other = joined(Direction::ClientToBroker, to_broker.await);
                (ended(Direction::BrokerToClient, &res), other, res)
            }
            None => {
                tracing::debug!(session = %id, "Session cancelled by shutdown");
                let a = joined(Direction::ClientToBroker, to_broker.await);
                let b = joined(Direction::BrokerToClient, to_client.await);
                (SessionEnd::Shutdown, a, b)
            }
        };

        for res in [&to_broker, &to_client] {
            if let Err(e) = res {
                tracing::warn!(session = %id, direction = %e.direction(), error = %e, "Error in data forwarding");
            }
        }

        Relayed {
            end,
            bytes_to_broker: bytes_of(&to_broker),
            bytes_to_client: bytes_of(&to_client),
        }
    }
}

struct Relayed {
    end: SessionEnd,
    bytes_to_broker: u64,
    bytes_to_client: u64,
}

/// Counts the session on its broker for as long as it lives.
struct ActiveSession {
    guard: SessionGuard,
    started: Instant,
    address: String,
}

impl ActiveSession {
    fn begin(broker: &Arc<Broker>) -> Self {
        let address = broker.address();
        metrics::session_started(&address);
        Self {
            guard: broker.begin_session(),
            started: Instant::now(),
            address,
        }
    }

    fn finish(self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        metrics::session_ended(&self.address, self.started.elapsed());
        tracing::trace!(broker = %self.guard.broker(), "Session released");
    }
}

/// Close a client that shutdown caught before it reached a broker.
fn cancelled(client: TcpStream, peer: SocketAddr, id: ConnectionId) -> RoutingError {
    tracing::debug!(session = %id, peer = %peer, "Session cancelled by shutdown before routing");
    metrics::record_routing_failure("cancelled");
    drop(client);
    RoutingError::Cancelled
}

fn joined(direction: Direction, res: Result<Result<PipeReport, ForwardError>, JoinError>) -> Result<PipeReport, ForwardError> {
    res.unwrap_or_else(|e| {
        Err(ForwardError::Task {
            direction,
            reason: e.to_string(),
        })
    })
}

fn ended(direction: Direction, res: &Result<PipeReport, ForwardError>) -> SessionEnd {
    match res {
        Ok(_) => SessionEnd::Closed(direction),
        Err(_) => SessionEnd::Failed(direction),
    }
}

fn bytes_of(res: &Result<PipeReport, ForwardError>) -> u64 {
    res.as_ref().map(|r| r.bytes).unwrap_or(0)
}
