// src/load_balancer/algorithm.rs
use crate::discovery::Instance;
use rand::RngCore;
use std::sync::Arc;

pub use crate::config::StrategyKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectError {
    #[error("Instance list is empty")]
    InvalidArgument,

    #[error("Load balancing strategy {0} is not registered")]
    UnsupportedStrategy(StrategyKind),

    #[error("Unknown load balancing strategy: {0}")]
    UnknownStrategy(String),
}

/// One selection policy. Implementations only mutate their own state.
pub trait Strategy: Send + Sync {
    /// Returns the index of the chosen instance. `key` is only read by
    /// hash-based strategies.
    fn select_index(
        &self,
        instances: &[Arc<Instance>],
        key: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> Result<usize, SelectError>;

    fn kind(&self) -> StrategyKind;
}

pub(crate) fn ensure_non_empty(instances: &[Arc<Instance>]) -> Result<(), SelectError> {
    if instances.is_empty() {
        Err(SelectError::InvalidArgument)
    } else {
        Ok(())
    }
}
