//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Client accepted
//!     → registry.rs (candidate set = enabled ∧ connected brokers,
//!                    reconnect everything once if the set is empty)
//!     → Apply load balancing strategy:
//!         - round_robin.rs (rotate through candidates)
//!         - random.rs (uniform pick)
//!         - weighted.rs (pick proportional to weight)
//!         - least_conn.rs (pick broker with fewest sessions)
//!     → broker.rs (session guard keeps the broker's count honest)
//! ```
//!
//! # Design Decisions
//! - Strategies are pure over the candidate slice; the registry owns broker state
//! - One strategy per proxy, chosen from configuration at startup
//! - Unavailable brokers are filtered out before a strategy ever sees them

use std::sync::Arc;

use crate::config::LoadBalancingKind;

pub mod broker;
pub mod least_conn;
pub mod random;
pub mod registry;
pub mod round_robin;
pub mod weighted;

pub use broker::{Broker, ConnectAttempt, LinkState, SessionGuard};
pub use least_conn::LeastConnections;
pub use random::Random;
pub use registry::BrokerRegistry;
pub use round_robin::RoundRobin;
pub use weighted::Weighted;

/// A broker selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick one of `candidates`.
    ///
    /// Returns `None` only when `candidates` is empty.
    fn select(&self, candidates: &[Arc<Broker>]) -> Option<Arc<Broker>>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Build the strategy named by the configuration.
pub fn strategy_for(kind: LoadBalancingKind) -> Box<dyn LoadBalancer> {
    match kind {
        LoadBalancingKind::RoundRobin => Box::new(RoundRobin::new()),
        LoadBalancingKind::Random => Box::new(Random::new()),
        LoadBalancingKind::Weighted => Box::new(Weighted::new()),
        LoadBalancingKind::LeastConnections => Box::new(LeastConnections::new()),
    }
}
