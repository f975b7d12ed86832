// src/load_balancer/consistent_hash.rs
use super::algorithm::{ensure_non_empty, SelectError, Strategy, StrategyKind};
use crate::discovery::Instance;
use rand::{Rng, RngCore};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Builder;

/// `hash(key) % len`.
///
/// Deterministic for a fixed key and list, but this is not a hash ring: any
/// change in list length remaps most keys. Missing or empty keys hash a
/// random UUID drawn from the supplied generator.
pub struct ConsistentHash;

impl ConsistentHash {
    pub(crate) fn hash_key(key: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }
}

impl Strategy for ConsistentHash {
    fn select_index(
        &self,
        instances: &[Arc<Instance>],
        key: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> Result<usize, SelectError> {
        ensure_non_empty(instances)?;

        let hash = match key.filter(|k| !k.is_empty()) {
            Some(key) => Self::hash_key(key),
            None => {
                let fallback = Builder::from_random_bytes(rng.gen()).into_uuid();
                Self::hash_key(&fallback.to_string())
            }
        };
        Ok((hash % instances.len() as u64) as usize)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::ConsistentHash
    }
}
