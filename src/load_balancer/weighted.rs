//! Weighted random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{broker::Broker, LoadBalancer};

/// Picks a candidate with probability proportional to its weight.
///
/// Only the weights of the candidates passed in count towards the total, so
/// disabled or disconnected brokers never dilute the others.
#[derive(Debug, Default)]
pub struct Weighted;

impl Weighted {
    pub fn new() -> Self {
        Self
    }

    /// Walk cumulative weights and return the first candidate whose running
    /// total exceeds `point`.
    fn pick(candidates: &[Arc<Broker>], point: u64) -> Option<&Arc<Broker>> {
        let mut cumulative = 0u64;
        candidates.iter().find(|broker| {
            cumulative += u64::from(broker.weight());
            point < cumulative
        })
    }
}

impl LoadBalancer for Weighted {
    fn select(&self, candidates: &[Arc<Broker>]) -> Option<Arc<Broker>> {
        let first = candidates.first()?;

        let total: u64 = candidates.iter().map(|b| u64::from(b.weight())).sum();
        if total == 0 {
            return Some(Arc::clone(first));
        }

        let point = rand::thread_rng().gen_range(0..total);
        Self::pick(candidates, point).or(Some(first)).cloned()
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}
