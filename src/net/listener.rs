//! Client-facing TCP listener.
//!
//! # Responsibilities
//! - Bind to the configured `listen_address:listen_port`
//! - Accept incoming TCP connections
//! - Report accept errors without tearing the listener down
//!
//! There is deliberately no connection cap here: every accepted client gets
//! its own session and only OS limits bound how many run at once.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::config::ProxyConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// Accepts raw client byte streams.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to the configured listen endpoint.
    pub async fn bind(config: &ProxyConfig) -> Result<Self, ListenerError> {
        let address = config.listen_endpoint();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ListenerError::Bind { address: address.clone(), source })?;

        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { address, source })?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner: listener })
    }

    /// Accept a new client connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %addr, error = %e, "Failed to set TCP_NODELAY on client socket");
        }

        tracing::debug!(peer = %addr, "Connection accepted");

        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
