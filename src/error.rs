//! Error taxonomy for the relay.
//!
//! Only [`ProxyError`] ever reaches the process host. Broker-level failures
//! ([`ConnectionError`]) stay on the broker that produced them, and
//! session-level failures ([`RoutingError`], [`ForwardError`]) end a single
//! client session.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::net::listener::ListenerError;
use crate::net::pipe::Direction;

/// A specific broker could not be reached.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connect to {broker} failed: {source}")]
    Io {
        broker: String,
        #[source]
        source: io::Error,
    },

    #[error("connect to {broker} timed out after {timeout_ms} ms")]
    Timeout { broker: String, timeout_ms: u128 },
}

impl ConnectionError {
    pub fn broker(&self) -> &str {
        match self {
            ConnectionError::Io { broker, .. } | ConnectionError::Timeout { broker, .. } => broker,
        }
    }
}

/// Failure to route one client session.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Zero eligible brokers, even after a reconnect attempt.
    #[error("no broker available")]
    NoBrokerAvailable,

    /// Shutdown arrived before the session reached a broker.
    #[error("session cancelled by shutdown")]
    Cancelled,

    /// The chosen broker refused the session's upstream connection.
    #[error(transparent)]
    Upstream(#[from] ConnectionError),
}

/// Mid-session I/O failure in one direction.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("{direction} read failed: {source}")]
    Read {
        direction: Direction,
        #[source]
        source: io::Error,
    },

    #[error("{direction} write failed: {source}")]
    Write {
        direction: Direction,
        #[source]
        source: io::Error,
    },

    /// The forwarder task itself panicked or was aborted.
    #[error("{direction} forwarder stopped unexpectedly: {reason}")]
    Task { direction: Direction, reason: String },
}

impl ForwardError {
    pub fn direction(&self) -> Direction {
        match self {
            ForwardError::Read { direction, .. }
            | ForwardError::Write { direction, .. }
            | ForwardError::Task { direction, .. } => *direction,
        }
    }
}

/// Process-fatal errors surfaced to the host.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("proxy already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_broker_identity() {
        let err = ConnectionError::Timeout { broker: "b1:9092".into(), timeout_ms: 250 };
        assert_eq!(err.to_string(), "connect to b1:9092 timed out after 250 ms");
        assert_eq!(err.broker(), "b1:9092");

        let routed: RoutingError = err.into();
        assert!(matches!(routed, RoutingError::Upstream(_)));
        assert_eq!(RoutingError::NoBrokerAvailable.to_string(), "no broker available");
    }

    #[test]
    fn forward_errors_name_their_direction() {
        let err = ForwardError::Write {
            direction: Direction::BrokerToClient,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "gone"),
        };
        assert_eq!(err.direction(), Direction::BrokerToClient);
        assert_eq!(err.to_string(), "broker->client write failed: gone");
    }
}
