//! Round-robin load balancing strategy.

use std::sync::{Arc, Mutex, PoisonError};

use crate::load_balancer::{broker::Broker, LoadBalancer};

/// Round-robin selector.
///
/// The cursor is shared by every selection call and guarded by its own lock.
/// Fairness is exact only while the candidate set stays the same between
/// calls: when brokers drop out or come back the cursor is reduced modulo the
/// new size, so a broker may be skipped or picked twice in a row.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn select(&self, candidates: &[Arc<Broker>]) -> Option<Arc<Broker>> {
        if candidates.is_empty() {
            return None;
        }

        let len = candidates.len();
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let index = *cursor % len;
        *cursor = (index + 1) % len;
        Some(Arc::clone(&candidates[index]))
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::brokers;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let nodes = brokers(&[1, 1]);

        let picks: Vec<String> = (0..6).map(|_| lb.select(&nodes).unwrap().address()).collect();
        assert_eq!(
            picks,
            vec![
                "127.0.0.1:9001",
                "127.0.0.1:9002",
                "127.0.0.1:9001",
                "127.0.0.1:9002",
                "127.0.0.1:9001",
                "127.0.0.1:9002",
            ]
        );
    }

    #[test]
    fn each_candidate_once_per_cycle() {
        let lb = RoundRobin::new();
        let nodes = brokers(&[1, 1, 1, 1, 1]);

        for _ in 0..3 {
            for expected in &nodes {
                let picked = lb.select(&nodes).unwrap();
                assert!(Arc::ptr_eq(&picked, expected));
            }
        }
    }

    #[test]
    fn shrinking_set_wraps_cursor() {
        let lb = RoundRobin::new();
        let all = brokers(&[1, 1, 1]);

        lb.select(&all).unwrap();
        lb.select(&all).unwrap();
        // Cursor now points at index 2; with two candidates it wraps to 0.
        let fewer = &all[..2];
        assert!(Arc::ptr_eq(&lb.select(fewer).unwrap(), &all[0]));
        assert!(Arc::ptr_eq(&lb.select(fewer).unwrap(), &all[1]));
    }
}
