//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{broker::Broker, LoadBalancer};

/// Least connections selector.
/// Selects the broker with the minimum number of active sessions.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for LeastConnections {
    fn select(&self, candidates: &[Arc<Broker>]) -> Option<Arc<Broker>> {
        // min_by_key keeps the first of equal minima, so ties go to list order.
        candidates
            .iter()
            .min_by_key(|b| b.active_sessions())
            .cloned()
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::brokers;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let nodes = brokers(&[1, 1]);
        let (b1, b2) = (&nodes[0], &nodes[1]);

        // artificially increase sessions on b1
        b1.increment_sessions();

        // Should pick b2 (0 sessions)
        let s1 = lb.select(&nodes).unwrap();
        assert!(Arc::ptr_eq(&s1, b2));

        // now b2 has 2, b1 has 1
        b2.increment_sessions();
        b2.increment_sessions();

        let s2 = lb.select(&nodes).unwrap();
        assert!(Arc::ptr_eq(&s2, b1));
    }

    #[test]
    fn ties_go_to_earliest() {
        let lb = LeastConnections::new();
        let nodes = brokers(&[1, 1, 1]);
        nodes[0].increment_sessions();

        // b2 and b3 both at zero: b2 comes first.
        assert!(Arc::ptr_eq(&lb.select(&nodes).unwrap(), &nodes[1]));

        nodes[1].increment_sessions();
        nodes[2].increment_sessions();
        // All at one: back to the head of the list.
        assert!(Arc::ptr_eq(&lb.select(&nodes).unwrap(), &nodes[0]));
    }

    #[test]
    fn follows_session_guards() {
        let lb = LeastConnections::new();
        let nodes = brokers(&[1, 1]);

        let guard = nodes[0].begin_session();
        assert!(Arc::ptr_eq(&lb.select(&nodes).unwrap(), &nodes[1]));
        drop(guard);
        assert!(Arc::ptr_eq(&lb.select(&nodes).unwrap(), &nodes[0]));
    }
}
