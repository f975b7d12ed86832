// src/load_balancer/round_robin.rs
use super::algorithm::{ensure_non_empty, SelectError, Strategy, StrategyKind};
use crate::discovery::Instance;
use rand::RngCore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Cycles through the list with a shared counter.
///
/// The index is `counter % len` of whatever list the caller passes, so the
/// "each instance once per cycle" property only holds while that list keeps
/// the same composition and order between calls.
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    fn next_ticket(&self) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for RoundRobin {
    fn select_index(
        &self,
        instances: &[Arc<Instance>],
        _key: Option<&str>,
        _rng: &mut dyn RngCore,
    ) -> Result<usize, SelectError> {
        ensure_non_empty(instances)?;
        Ok(self.next_ticket() % instances.len())
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::RoundRobin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_concurrent_tickets_are_unique() {
        let rr = Arc::new(RoundRobin::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rr = rr.clone();
                thread::spawn(move || (0..1_000).map(|_| rr.next_ticket()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for ticket in handle.join().unwrap() {
                assert!(seen.insert(ticket), "duplicate ticket {}", ticket);
            }
        }
        assert_eq!(seen.len(), 8_000);
        assert_eq!(rr.next_ticket(), 8_000);
    }

    #[test]
    fn test_starts_at_first_instance() {
        let rr = RoundRobin::new();
        let instances = vec![
            Arc::new(Instance::new("a", "svc", "10.0.0.1", 80)),
            Arc::new(Instance::new("b", "svc", "10.0.0.2", 80)),
        ];
        let mut rng = rand::thread_rng();

        assert_eq!(rr.select_index(&instances, None, &mut rng).unwrap(), 0);
        assert_eq!(rr.select_index(&instances, None, &mut rng).unwrap(), 1);
        assert_eq!(rr.select_index(&instances, None, &mut rng).unwrap(), 0);
    }
}
