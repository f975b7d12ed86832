// src/load_balancer/weighted_round_robin.rs
use super::algorithm::{ensure_non_empty, SelectError, Strategy, StrategyKind};
use crate::discovery::Instance;
use rand::{Rng, RngCore};
use std::sync::Arc;

/// Weighted random draw over the integer instance weights.
pub struct WeightedRoundRobin;

impl WeightedRoundRobin {
    /// First instance whose cumulative weight exceeds `draw`; the last one if none does.
    pub(crate) fn index_for_draw(instances: &[Arc<Instance>], draw: u64) -> usize {
        let mut cumulative = 0u64;
        for (index, instance) in instances.iter().enumerate() {
            cumulative += u64::from(instance.weight);
            if draw < cumulative {
                return index;
            }
        }
        instances.len() - 1
    }
}

impl Strategy for WeightedRoundRobin {
    fn select_index(
        &self,
        instances: &[Arc<Instance>],
        _key: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> Result<usize, SelectError> {
        ensure_non_empty(instances)?;

        let total: u64 = instances.iter().map(|i| u64::from(i.weight)).sum();
        if total == 0 {
            return Ok(instances.len() - 1);
        }
        let draw = rng.gen_range(0..total);
        Ok(Self::index_for_draw(instances, draw))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::WeightedRoundRobin
    }
}
