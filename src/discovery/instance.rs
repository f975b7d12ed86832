// src/discovery/instance.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One discovered, currently-healthy service endpoint.
///
/// Instances are built once per discovery poll and shared as `Arc<Instance>`;
/// the next poll produces a fresh list rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub service_name: String,
    pub address: String,
    pub port: u16,
    pub weight: u32,
    pub tags: BTreeSet<String>,
    pub active_connections: u64,
    pub avg_response_time: f64,
}

impl Instance {
    pub fn new(
        id: impl Into<String>,
        service_name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            service_name: service_name.into(),
            address: address.into(),
            port,
            weight: 1,
            tags: BTreeSet::new(),
            active_connections: 0,
            avg_response_time: 1.0,
        }
    }

    /// Weights below one are raised to one.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_active_connections(mut self, active_connections: u64) -> Self {
        self.active_connections = active_connections;
        self
    }

    /// Non-positive or non-finite values fall back to 1.0.
    pub fn with_avg_response_time(mut self, avg_response_time: f64) -> Self {
        self.avg_response_time = if avg_response_time.is_finite() && avg_response_time > 0.0 {
            avg_response_time
        } else {
            1.0
        };
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}
