// src/load_balancer/random.rs
use super::algorithm::{ensure_non_empty, SelectError, Strategy, StrategyKind};
use crate::discovery::Instance;
use rand::{Rng, RngCore};
use std::sync::Arc;

pub struct RandomSelect;

impl Strategy for RandomSelect {
    fn select_index(
        &self,
        instances: &[Arc<Instance>],
        _key: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> Result<usize, SelectError> {
        ensure_non_empty(instances)?;
        Ok(rng.gen_range(0..instances.len()))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_covers_every_index() {
        let instances: Vec<_> = (0..4)
            .map(|i| Arc::new(Instance::new(format!("i{i}"), "svc", "10.0.0.1", 80)))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut hits = [0usize; 4];

        for _ in 0..4_000 {
            hits[RandomSelect.select_index(&instances, None, &mut rng).unwrap()] += 1;
        }

        for count in hits {
            assert!((800..1_200).contains(&count), "skewed distribution {:?}", hits);
        }
    }
}
