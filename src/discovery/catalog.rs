// src/discovery/catalog.rs
use async_trait::async_trait;
use std::time::Duration;

/// Raw instance record as reported by a catalog backend, before health filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub service_name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub weight: Option<u32>,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub id: String,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Passing,
    Warning,
    Critical,
    Unknown,
}

impl CheckStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "passing" => CheckStatus::Passing,
            "warning" => CheckStatus::Warning,
            "critical" => CheckStatus::Critical,
            _ => CheckStatus::Unknown,
        }
    }
}

impl CatalogEntry {
    /// Healthy iff at least one check exists and every check is passing.
    pub fn is_passing(&self) -> bool {
        !self.checks.is_empty()
            && self
                .checks
                .iter()
                .all(|check| check.status == CheckStatus::Passing)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Catalog returned HTTP {status} for {operation}")]
    UnexpectedStatus { operation: String, status: u16 },

    #[error("Catalog {operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),
}

/// Abstract service catalog (Consul or anything shaped like it).
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn list_services(&self) -> Result<Vec<String>, CatalogError>;

    async fn healthy_instances(&self, service_name: &str) -> Result<Vec<CatalogEntry>, CatalogError>;

    fn name(&self) -> &'static str;
}
