//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use broker_proxy::config::{BrokerConfig, LoadBalancingKind, ProxyConfig};
use broker_proxy::ProxyServer;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Start a mock broker that echoes every byte back on each connection.
pub async fn start_echo_broker() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// Start a mock broker that greets every connection with `tag`, then echoes.
pub async fn start_tagged_broker(tag: u8) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if socket.write_all(&[tag]).await.is_err() {
                    return;
                }
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// A port on 127.0.0.1 with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn broker(addr: SocketAddr) -> BrokerConfig {
    BrokerConfig::new(addr.ip().to_string(), addr.port())
}

/// Proxy configuration on an ephemeral loopback port with a long health interval.
pub fn proxy_config(brokers: Vec<BrokerConfig>, strategy: LoadBalancingKind) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listen_address = "127.0.0.1".into();
    config.listen_port = 0;
    config.brokers = brokers;
    config.load_balancing = strategy;
    config.connection_timeout_ms = 2_000;
    config.health_check_interval_ms = 60_000;
    config.observability.metrics_enabled = false;
    config
}

/// Build and start a proxy; returns it with its bound address.
pub async fn start_proxy(config: ProxyConfig) -> (ProxyServer, SocketAddr) {
    let mut server = ProxyServer::new(config).unwrap();
    let addr = server.start().await.unwrap();
    (server, addr)
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    true
}
