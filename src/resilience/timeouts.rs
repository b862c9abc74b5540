//! Timeout enforcement for outbound connects.
//!
//! Every broker connect (registry reconnects and per-session upstream
//! sockets) goes through [`connect`], so no connect can hang past
//! `connection_timeout_ms`.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time;

use crate::config::BrokerConfig;
use crate::error::ConnectionError;

/// Open a TCP connection to `broker`, failing after `timeout`.
pub async fn connect(broker: &BrokerConfig, timeout: Duration) -> Result<TcpStream, ConnectionError> {
    let attempt = TcpStream::connect((broker.host.as_str(), broker.port));

    match time::timeout(timeout, attempt).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(broker = %broker, error = %e, "Failed to set TCP_NODELAY on broker socket");
            }
            Ok(stream)
        }
        Ok(Err(source)) => Err(ConnectionError::Io { broker: broker.to_string(), source }),
        Err(_) => Err(ConnectionError::Timeout {
            broker: broker.to_string(),
            timeout_ms: timeout.as_millis(),
        }),
    }
}
