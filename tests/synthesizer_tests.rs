// tests/synthesizer_tests.rs
use async_trait::async_trait;
use rust_discovery_gateway::config::{ProbeConfig, StrategyKind, SynthesizerConfig};
use rust_discovery_gateway::discovery::{
    CatalogBackend, CatalogEntry, CatalogError, CheckStatus, DiscoveryClient, HealthCheck,
};
use rust_discovery_gateway::health::HealthProber;
use rust_discovery_gateway::synthesizer::{ConfigSynthesizer, PathTransform, RefreshOutcome};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Catalog whose topology the test can rewrite between cycles.
#[derive(Default)]
struct ScriptedCatalog {
    services: Mutex<BTreeMap<String, Vec<CatalogEntry>>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedCatalog {
    fn set(&self, service: &str, entries: Vec<CatalogEntry>) {
        self.services
            .lock()
            .unwrap()
            .insert(service.to_string(), entries);
    }

    fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl CatalogBackend for ScriptedCatalog {
    async fn list_services(&self) -> Result<Vec<String>, CatalogError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.services.lock().unwrap().keys().cloned().collect())
    }

    async fn healthy_instances(&self, name: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self
            .services
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn entry(id: &str, service: &str, address: &str, port: u16, status: CheckStatus) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        service_name: service.to_string(),
        address: address.to_string(),
        port,
        tags: vec![],
        weight: None,
        checks: vec![HealthCheck {
            id: "serfHealth".to_string(),
            status,
        }],
    }
}

fn discovery(catalog: Arc<ScriptedCatalog>) -> Arc<DiscoveryClient> {
    let prober = HealthProber::new(&ProbeConfig::default(), None).unwrap();
    Arc::new(DiscoveryClient::new(catalog, ["consul"], prober))
}

fn config(interval_secs: u64) -> SynthesizerConfig {
    SynthesizerConfig {
        interval_secs,
        cluster_strategy: StrategyKind::RoundRobin,
    }
}

#[tokio::test]
async fn test_bootstrap_publishes_one_route_and_cluster_per_service() {
    let catalog = Arc::new(ScriptedCatalog::default());
    catalog.set(
        "svc1",
        vec![
            entry("i1", "svc1", "10.0.0.1", 9001, CheckStatus::Passing),
            entry("i2", "svc1", "10.0.0.2", 9001, CheckStatus::Passing),
        ],
    );

    let synthesizer = ConfigSynthesizer::bootstrap(discovery(catalog), config(30), None).await;
    let snapshot = synthesizer.get_config();

    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.routes().len(), 1);
    assert_eq!(snapshot.clusters().len(), 1);

    let route = &snapshot.routes()[0];
    assert_eq!(route.route_id, "svc1-route");
    assert_eq!(route.path, "/svc1/**");
    assert_eq!(route.transforms, vec![PathTransform::RemovePrefix("/svc1".to_string())]);

    let cluster = &snapshot.clusters()[0];
    assert_eq!(cluster.cluster_id, "svc1");
    let destinations: Vec<(&str, &str)> = cluster
        .destinations
        .iter()
        .map(|(id, d)| (id.as_str(), d.address.as_str()))
        .collect();
    assert_eq!(
        destinations,
        vec![("i1", "http://10.0.0.1:9001"), ("i2", "http://10.0.0.2:9001")]
    );
}

#[tokio::test]
async fn test_service_without_healthy_instances_gets_no_route() {
    let catalog = Arc::new(ScriptedCatalog::default());
    catalog.set("svc1", vec![entry("i1", "svc1", "10.0.0.1", 9001, CheckStatus::Passing)]);
    catalog.set("svc2", vec![entry("j1", "svc2", "10.0.0.9", 9001, CheckStatus::Critical)]);
    catalog.set("consul", vec![entry("c1", "consul", "10.0.0.5", 8300, CheckStatus::Passing)]);

    let synthesizer = ConfigSynthesizer::bootstrap(discovery(catalog), config(30), None).await;
    let snapshot = synthesizer.get_config();

    let clusters: Vec<&str> = snapshot.clusters().iter().map(|c| c.cluster_id.as_str()).collect();
    assert_eq!(clusters, vec!["svc1"]);
    assert!(snapshot.route_for("/svc2/anything").is_none());
    assert!(snapshot.route_for("/consul/anything").is_none());
}

#[tokio::test]
async fn test_failed_cycle_keeps_previous_snapshot() {
    let catalog = Arc::new(ScriptedCatalog::default());
    catalog.set("svc1", vec![entry("i1", "svc1", "10.0.0.1", 9001, CheckStatus::Passing)]);

    let synthesizer =
        ConfigSynthesizer::bootstrap(discovery(catalog.clone()), config(30), None).await;
    let before = synthesizer.get_config();

    catalog.set(
        "svc1",
        vec![
            entry("dup", "svc1", "10.0.0.1", 9001, CheckStatus::Passing),
            entry("dup", "svc1", "10.0.0.2", 9001, CheckStatus::Passing),
        ],
    );

    assert_eq!(synthesizer.refresh().await, RefreshOutcome::Failed);
    let after = synthesizer.get_config();
    assert_eq!(after.version, before.version);
    assert!(!before.change_signal.has_changed());
    assert!(after.clusters()[0].destinations.contains_key("i1"));
}

#[tokio::test]
async fn test_refresh_signals_readers_of_old_snapshot() {
    let catalog = Arc::new(ScriptedCatalog::default());
    let synthesizer =
        ConfigSynthesizer::bootstrap(discovery(catalog.clone()), config(30), None).await;
    let old = synthesizer.get_config();
    assert!(old.routes().is_empty());

    catalog.set("svc1", vec![entry("i1", "svc1", "10.0.0.1", 9001, CheckStatus::Passing)]);
    let signal = old.change_signal.clone();
    let waiter = tokio::spawn(async move { signal.changed().await });

    assert_eq!(synthesizer.refresh().await, RefreshOutcome::Published(2));
    assert!(waiter.await.unwrap());

    let new = synthesizer.get_config();
    assert_eq!(new.version, 2);
    assert_eq!(new.routes().len(), 1);
    // The old snapshot itself is untouched.
    assert!(old.routes().is_empty());
}

#[tokio::test]
async fn test_overlapping_refresh_is_skipped() {
    let catalog = Arc::new(ScriptedCatalog::default());
    let synthesizer =
        ConfigSynthesizer::bootstrap(discovery(catalog.clone()), config(30), None).await;
    catalog.set_delay(Duration::from_millis(300));

    let slow = {
        let synthesizer = synthesizer.clone();
        tokio::spawn(async move { synthesizer.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(synthesizer.refresh().await, RefreshOutcome::Skipped);
    assert_eq!(slow.await.unwrap(), RefreshOutcome::Published(2));
}

#[tokio::test]
async fn test_periodic_task_publishes_and_shuts_down() {
    let catalog = Arc::new(ScriptedCatalog::default());
    let synthesizer =
        ConfigSynthesizer::bootstrap(discovery(catalog.clone()), config(1), None).await;
    let mut versions = synthesizer.subscribe();

    let task = synthesizer.spawn();
    catalog.set("svc1", vec![entry("i1", "svc1", "10.0.0.1", 9001, CheckStatus::Passing)]);

    tokio::time::timeout(Duration::from_secs(5), versions.changed())
        .await
        .expect("periodic cycle did not run")
        .unwrap();
    assert!(synthesizer.get_config().version >= 2);
    assert_eq!(synthesizer.get_config().routes().len(), 1);

    task.shutdown().await;
    let stopped_at = synthesizer.get_config().version;
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(synthesizer.get_config().version, stopped_at);
}
