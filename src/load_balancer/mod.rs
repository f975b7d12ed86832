// src/load_balancer/mod.rs
mod algorithm;
mod consistent_hash;
mod least_connection;
mod random;
mod round_robin;
mod weighted_response_time;
mod weighted_round_robin;

pub use algorithm::{SelectError, Strategy, StrategyKind};
pub use consistent_hash::ConsistentHash;
pub use least_connection::LeastConnection;
pub use random::RandomSelect;
pub use round_robin::RoundRobin;
pub use weighted_response_time::WeightedResponseTime;
pub use weighted_round_robin::WeightedRoundRobin;

use crate::discovery::Instance;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;

pub fn create_strategy(kind: StrategyKind) -> Arc<dyn Strategy> {
    match kind {
        StrategyKind::Random => Arc::new(RandomSelect),
        StrategyKind::RoundRobin => Arc::new(RoundRobin::new()),
        StrategyKind::WeightedRoundRobin => Arc::new(WeightedRoundRobin),
        StrategyKind::LeastConnection => Arc::new(LeastConnection),
        StrategyKind::ConsistentHash => Arc::new(ConsistentHash),
        StrategyKind::WeightedResponseTime => Arc::new(WeightedResponseTime),
    }
}

/// Fixed registry of one selector per strategy kind, built once.
pub struct LoadBalancer {
    strategies: HashMap<StrategyKind, Arc<dyn Strategy>>,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self::with_strategies(StrategyKind::ALL)
    }

    pub fn with_strategies<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = StrategyKind>,
    {
        let strategies = kinds
            .into_iter()
            .map(|kind| (kind, create_strategy(kind)))
            .collect();
        Self { strategies }
    }

    pub fn supports(&self, kind: StrategyKind) -> bool {
        self.strategies.contains_key(&kind)
    }

    /// Selects with the calling thread's generator.
    pub fn select_next(
        &self,
        instances: &[Arc<Instance>],
        kind: StrategyKind,
        key: Option<&str>,
    ) -> Result<Arc<Instance>, SelectError> {
        self.select_next_with_rng(instances, kind, key, &mut rand::thread_rng())
    }

    pub fn select_next_with_rng(
        &self,
        instances: &[Arc<Instance>],
        kind: StrategyKind,
        key: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> Result<Arc<Instance>, SelectError> {
        let strategy = self
            .strategies
            .get(&kind)
            .ok_or(SelectError::UnsupportedStrategy(kind))?;

        let index = strategy.select_index(instances, key, rng)?;
        tracing::trace!(
            strategy = %strategy.kind(),
            instance = %instances[index].id,
            "selected instance"
        );
        Ok(instances[index].clone())
    }
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}
