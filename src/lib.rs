//! Layer-4 TCP relay for a cluster of message brokers.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    BROKER PROXY                      │
//!                     │                                                      │
//!  Client ────────────┼─▶ net::listener ──▶ routing::router ──▶ net::pipe ×2 ─┼──▶ Broker
//!                     │                          │                           │
//!                     │                          ▼                           │
//!                     │                 load_balancer::registry              │
//!                     │                  (strategy, broker state)            │
//!                     │                          ▲                           │
//!                     │                          │                           │
//!                     │                  health::checker (timer)             │
//!                     │                                                      │
//!                     │  ┌────────────────────────────────────────────────┐  │
//!                     │  │ config · observability · resilience · lifecycle │  │
//!                     │  └────────────────────────────────────────────────┘  │
//!                     └──────────────────────────────────────────────────────┘
//! ```
//!
//! Bytes are relayed unmodified. Each client connection is routed once, to one
//! broker, over its own upstream connection.

// Core subsystems
pub mod config;
pub mod error;
pub mod net;
pub mod proxy;
pub mod routing;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::{BrokerConfig, LoadBalancingKind, ProxyConfig};
pub use error::{ConnectionError, ForwardError, ProxyError, RoutingError};
pub use lifecycle::Shutdown;
pub use load_balancer::BrokerRegistry;
pub use proxy::ProxyServer;
pub use routing::ConnectionRouter;
