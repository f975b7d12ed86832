// src/metrics/collector.rs
use anyhow::{Context, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("Failed to encode metrics")?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Synthesis metrics
    pub synthesis_cycles_total: IntCounterVec,
    pub synthesis_duration_seconds: Histogram,
    pub snapshot_version: IntGauge,
    pub published_routes: IntGauge,
    pub published_clusters: IntGauge,
    pub healthy_instances: IntGauge,

    // Discovery metrics
    pub catalog_requests_total: IntCounterVec,
    pub probes_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let synthesis_cycles_total = IntCounterVec::new(
            Opts::new("gw_synthesis_cycles_total", "Routing synthesis cycles by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(synthesis_cycles_total.clone()))?;

        let synthesis_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "gw_synthesis_duration_seconds",
            "Duration of a routing synthesis cycle",
        ))?;
        registry.register(Box::new(synthesis_duration_seconds.clone()))?;

        let snapshot_version =
            IntGauge::new("gw_snapshot_version", "Version of the published routing snapshot")?;
        registry.register(Box::new(snapshot_version.clone()))?;

        let published_routes =
            IntGauge::new("gw_published_routes", "Routes in the published snapshot")?;
        registry.register(Box::new(published_routes.clone()))?;

        let published_clusters =
            IntGauge::new("gw_published_clusters", "Clusters in the published snapshot")?;
        registry.register(Box::new(published_clusters.clone()))?;

        let healthy_instances = IntGauge::new(
            "gw_healthy_instances",
            "Healthy instances seen by the last synthesis cycle",
        )?;
        registry.register(Box::new(healthy_instances.clone()))?;

        let catalog_requests_total = IntCounterVec::new(
            Opts::new("gw_catalog_requests_total", "Catalog requests by operation and status"),
            &["operation", "status"],
        )?;
        registry.register(Box::new(catalog_requests_total.clone()))?;

        let probes_total = IntCounterVec::new(
            Opts::new("gw_probes_total", "Direct health probes by result"),
            &["result"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        Ok(Self {
            synthesis_cycles_total,
            synthesis_duration_seconds,
            snapshot_version,
            published_routes,
            published_clusters,
            healthy_instances,
            catalog_requests_total,
            probes_total,
        })
    }

    pub fn record_synthesis_published(
        &self,
        version: u64,
        routes: usize,
        clusters: usize,
        instances: usize,
        duration: Duration,
    ) {
        self.synthesis_cycles_total
            .with_label_values(&["published"])
            .inc();
        self.synthesis_duration_seconds.observe(duration.as_secs_f64());
        self.snapshot_version.set(version as i64);
        self.published_routes.set(routes as i64);
        self.published_clusters.set(clusters as i64);
        self.healthy_instances.set(instances as i64);
    }

    pub fn record_synthesis_failed(&self, duration: Duration) {
        self.synthesis_cycles_total
            .with_label_values(&["failed"])
            .inc();
        self.synthesis_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_synthesis_skipped(&self) {
        self.synthesis_cycles_total
            .with_label_values(&["skipped"])
            .inc();
    }

    pub fn record_catalog_request(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.catalog_requests_total
            .with_label_values(&[operation, status])
            .inc();
    }

    pub fn record_probe(&self, healthy: bool) {
        let result = if healthy { "healthy" } else { "unhealthy" };
        self.probes_total.with_label_values(&[result]).inc();
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_exposes_recorded_values() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_synthesis_published(3, 2, 2, 5, Duration::from_millis(12));
        metrics.record_catalog_request("list_services", false);
        metrics.record_probe(true);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("gw_snapshot_version 3"));
        assert!(text.contains("gw_published_routes 2"));
        assert!(text.contains(r#"gw_catalog_requests_total{operation="list_services",status="failure"} 1"#));
        assert!(text.contains(r#"gw_probes_total{result="healthy"} 1"#));
    }
}
