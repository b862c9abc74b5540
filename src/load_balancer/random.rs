//! Uniform random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{broker::Broker, LoadBalancer};

/// Picks a candidate uniformly at random.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn select(&self, candidates: &[Arc<Broker>]) -> Option<Arc<Broker>> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Some(Arc::clone(&candidates[index]))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
