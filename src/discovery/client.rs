// src/discovery/client.rs
use super::catalog::{CatalogBackend, CatalogEntry, CheckStatus};
use super::instance::Instance;
use crate::config::StrategyKind;
use crate::health::HealthProber;
use crate::load_balancer::{LoadBalancer, SelectError};
use crate::metrics::MetricsCollector;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Turns catalog responses into healthy `Instance` lists.
///
/// Catalog failures are logged and surface as empty results, so callers see
/// "no instances" both when a service is down and when the catalog is.
pub struct DiscoveryClient {
    backend: Arc<dyn CatalogBackend>,
    excluded: HashSet<String>,
    prober: HealthProber,
    load_balancer: Arc<LoadBalancer>,
    default_strategy: StrategyKind,
    metrics: Option<Arc<MetricsCollector>>,
}

impl DiscoveryClient {
    pub fn new<I, S>(backend: Arc<dyn CatalogBackend>, excluded: I, prober: HealthProber) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backend,
            excluded: excluded.into_iter().map(Into::into).collect(),
            prober,
            load_balancer: Arc::new(LoadBalancer::new()),
            default_strategy: StrategyKind::default(),
            metrics: None,
        }
    }

    pub fn with_load_balancer(mut self, load_balancer: Arc<LoadBalancer>) -> Self {
        self.load_balancer = load_balancer;
        self
    }

    /// Strategy used by `next_instance` when the caller names none.
    pub fn with_default_strategy(mut self, strategy: StrategyKind) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn load_balancer(&self) -> &Arc<LoadBalancer> {
        &self.load_balancer
    }

    pub async fn list_service_names(&self) -> BTreeSet<String> {
        match self.backend.list_services().await {
            Ok(names) => {
                self.record_catalog_request("list_services", true);
                names
                    .into_iter()
                    .filter(|name| !name.is_empty() && !self.excluded.contains(name))
                    .collect()
            }
            Err(e) => {
                self.record_catalog_request("list_services", false);
                error!("Failed to list services from {}: {}", self.backend.name(), e);
                BTreeSet::new()
            }
        }
    }

    pub async fn fetch_healthy(&self, service_name: &str) -> Vec<Arc<Instance>> {
        let entries = match self.backend.healthy_instances(service_name).await {
            Ok(entries) => {
                self.record_catalog_request("healthy_instances", true);
                entries
            }
            Err(e) => {
                self.record_catalog_request("healthy_instances", false);
                warn!(
                    "Failed to fetch instances of {} from {}: {}",
                    service_name,
                    self.backend.name(),
                    e
                );
                return Vec::new();
            }
        };

        let total = entries.len();
        let instances: Vec<Arc<Instance>> = entries
            .into_iter()
            .filter(|entry| {
                let passing = entry.is_passing();
                if !passing {
                    let failing: Vec<&str> = entry
                        .checks
                        .iter()
                        .filter(|check| check.status != CheckStatus::Passing)
                        .map(|check| check.id.as_str())
                        .collect();
                    debug!(
                        "Instance {} of {} excluded, failing checks {:?}",
                        entry.id, service_name, failing
                    );
                }
                passing
            })
            .map(|entry| Arc::new(to_instance(entry)))
            .collect();

        debug!(
            "Service {}: {}/{} catalog entries passing",
            service_name,
            instances.len(),
            total
        );
        instances
    }

    /// Healthy instances of every listed service, grouped in listing order.
    pub async fn fetch_all_healthy(&self) -> Vec<Arc<Instance>> {
        let names = self.list_service_names().await;
        let fetches = names.iter().map(|name| self.fetch_healthy(name));
        let groups = futures::future::join_all(fetches).await;

        let instances: Vec<Arc<Instance>> = groups.into_iter().flatten().collect();
        info!(
            "Discovered {} healthy instances across {} services",
            instances.len(),
            names.len()
        );
        instances
    }

    pub async fn probe_health(&self, instance: &Instance) -> bool {
        self.prober.probe(instance).await
    }

    pub async fn is_service_healthy(&self, service_name: &str) -> bool {
        !self.fetch_healthy(service_name).await.is_empty()
    }

    /// `Ok(None)` when the service currently has no healthy instance.
    /// `strategy: None` falls back to the configured default.
    pub async fn next_instance(
        &self,
        service_name: &str,
        strategy: Option<StrategyKind>,
        key: Option<&str>,
    ) -> Result<Option<Arc<Instance>>, SelectError> {
        let strategy = strategy.unwrap_or(self.default_strategy);
        let instances = self.fetch_healthy(service_name).await;
        if instances.is_empty() {
            return Ok(None);
        }

        self.load_balancer
            .select_next(&instances, strategy, key)
            .map(Some)
    }

    fn record_catalog_request(&self, operation: &str, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_catalog_request(operation, success);
        }
    }
}

fn to_instance(entry: CatalogEntry) -> Instance {
    Instance::new(entry.id, entry.service_name, entry.address, entry.port)
        .with_weight(entry.weight.unwrap_or(1))
        .with_tags(entry.tags)
}
