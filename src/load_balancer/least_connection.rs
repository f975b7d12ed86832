// src/load_balancer/least_connection.rs
use super::algorithm::{ensure_non_empty, SelectError, Strategy, StrategyKind};
use crate::discovery::Instance;
use rand::RngCore;
use std::sync::Arc;

/// Fewest active connections wins; ties go to the earliest instance in the list.
pub struct LeastConnection;

impl Strategy for LeastConnection {
    fn select_index(
        &self,
        instances: &[Arc<Instance>],
        _key: Option<&str>,
        _rng: &mut dyn RngCore,
    ) -> Result<usize, SelectError> {
        ensure_non_empty(instances)?;

        let mut best = 0;
        for (index, instance) in instances.iter().enumerate().skip(1) {
            if instance.active_connections < instances[best].active_connections {
                best = index;
            }
        }
        Ok(best)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::LeastConnection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_minimum_wins() {
        let instances: Vec<_> = [5, 2, 2]
            .into_iter()
            .enumerate()
            .map(|(i, conn)| {
                Arc::new(Instance::new(format!("i{i}"), "svc", "10.0.0.1", 80).with_active_connections(conn))
            })
            .collect();

        let index = LeastConnection
            .select_index(&instances, None, &mut rand::thread_rng())
            .unwrap();
        assert_eq!(index, 1);
    }
}
