// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub synthesizer: SynthesizerConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub load_balancer: LoadBalancerConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.catalog.timeout_secs == 0 {
            bail!("catalog.timeout_secs must be greater than zero");
        }
        if self.synthesizer.interval_secs == 0 {
            bail!("synthesizer.interval_secs must be greater than zero");
        }
        if self.probe.timeout_secs == 0 {
            bail!("probe.timeout_secs must be greater than zero");
        }
        if !self.probe.path.starts_with('/') {
            bail!("probe.path must start with '/': {}", self.probe.path);
        }

        let lb = &self.load_balancer;
        if lb.strategies.is_empty() {
            bail!("load_balancer.strategies must enable at least one strategy");
        }
        if !lb.strategies.contains(&lb.default_strategy) {
            bail!(
                "load_balancer.default_strategy {} is not among the enabled strategies",
                lb.default_strategy
            );
        }

        for path in [&self.admin.metrics_path, &self.admin.config_path] {
            if !path.starts_with('/') {
                bail!("admin paths must start with '/': {}", path);
            }
        }
        if self.admin.metrics_path == self.admin.config_path {
            bail!("admin.metrics_path and admin.config_path must differ");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub address: Url,

    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,

    /// Infrastructure names never treated as routable services.
    #[serde(default = "default_excluded_services")]
    pub excluded_services: Vec<String>,

    #[serde(default)]
    pub datacenter: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
}

impl CatalogConfig {
    pub fn new(address: Url) -> Self {
        Self {
            address,
            timeout_secs: default_catalog_timeout(),
            excluded_services: default_excluded_services(),
            datacenter: None,
            token: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default)]
    pub cluster_strategy: StrategyKind,
}

impl SynthesizerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            cluster_strategy: StrategyKind::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_probe_path")]
    pub path: String,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
            path: default_probe_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    #[serde(default)]
    pub default_strategy: StrategyKind,

    #[serde(default = "StrategyKind::all")]
    pub strategies: Vec<StrategyKind>,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategyKind::default(),
            strategies: StrategyKind::all(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_admin_bind")]
    pub bind: SocketAddr,

    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    #[serde(default = "default_config_path")]
    pub config_path: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_admin_bind(),
            metrics_path: default_metrics_path(),
            config_path: default_config_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Random,
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    LeastConnection,
    ConsistentHash,
    WeightedResponseTime,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Random,
        StrategyKind::RoundRobin,
        StrategyKind::WeightedRoundRobin,
        StrategyKind::LeastConnection,
        StrategyKind::ConsistentHash,
        StrategyKind::WeightedResponseTime,
    ];

    pub fn all() -> Vec<StrategyKind> {
        Self::ALL.to_vec()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Random => "random",
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::WeightedRoundRobin => "weighted_round_robin",
            StrategyKind::LeastConnection => "least_connection",
            StrategyKind::ConsistentHash => "consistent_hash",
            StrategyKind::WeightedResponseTime => "weighted_response_time",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = crate::load_balancer::SelectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| crate::load_balancer::SelectError::UnknownStrategy(s.to_string()))
    }
}

fn default_catalog_timeout() -> u64 {
    5
}

fn default_excluded_services() -> Vec<String> {
    vec!["consul".to_string()]
}

fn default_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_probe_path() -> String {
    "/health".to_string()
}

fn default_admin_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_config_path() -> String {
    "/config".to_string()
}
