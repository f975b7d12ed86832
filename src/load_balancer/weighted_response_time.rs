// src/load_balancer/weighted_response_time.rs
use super::algorithm::{ensure_non_empty, SelectError, Strategy, StrategyKind};
use crate::discovery::Instance;
use rand::{Rng, RngCore};
use std::sync::Arc;

/// Weighted random draw where instance `i` weighs `1 / avg_response_time[i]`.
pub struct WeightedResponseTime;

impl WeightedResponseTime {
    /// First instance whose cumulative weight reaches `draw`; the last one if
    /// rounding leaves the draw above the final sum.
    pub(crate) fn index_for_draw(instances: &[Arc<Instance>], draw: f64) -> usize {
        let mut cumulative = 0.0;
        for (index, instance) in instances.iter().enumerate() {
            cumulative += 1.0 / instance.avg_response_time;
            if draw <= cumulative {
                return index;
            }
        }
        instances.len() - 1
    }
}

impl Strategy for WeightedResponseTime {
    fn select_index(
        &self,
        instances: &[Arc<Instance>],
        _key: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> Result<usize, SelectError> {
        ensure_non_empty(instances)?;

        let total: f64 = instances.iter().map(|i| 1.0 / i.avg_response_time).sum();
        let draw = rng.gen::<f64>() * total;
        Ok(Self::index_for_draw(instances, draw))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::WeightedResponseTime
    }
}
