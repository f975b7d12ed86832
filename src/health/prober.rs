// src/health/prober.rs
use crate::config::ProbeConfig;
use crate::discovery::Instance;
use crate::metrics::MetricsCollector;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Direct HTTP health probe, independent of what the catalog reports.
pub struct HealthProber {
    client: Client,
    path: String,
    timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub instance_id: String,
    pub healthy: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl HealthProber {
    pub fn new(
        config: &ProbeConfig,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            path: config.path.clone(),
            timeout: config.timeout(),
            metrics,
        })
    }

    /// Never fails: any error, timeout or non-2xx status reads as unhealthy.
    pub async fn probe(&self, instance: &Instance) -> bool {
        self.check(instance).await.healthy
    }

    pub async fn check(&self, instance: &Instance) -> ProbeResult {
        let start = Instant::now();
        let url = format!("{}{}", instance.base_url(), self.path);

        let result = timeout(self.timeout, self.client.get(&url).send()).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let (healthy, error) = match result {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    (true, None)
                } else {
                    (false, Some(format!("HTTP {}", status)))
                }
            }
            Ok(Err(e)) => (false, Some(e.to_string())),
            Err(_) => (false, Some("Probe timeout".to_string())),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_probe(healthy);
        }

        if healthy {
            debug!("Instance {} answered {} in {}ms", instance.id, url, response_time_ms);
        } else {
            warn!("Instance {} failed probe of {}: {:?}", instance.id, url, error);
        }

        ProbeResult {
            instance_id: instance.id.clone(),
            healthy,
            response_time_ms,
            error,
        }
    }

    /// Probes every instance concurrently; results keep the input order.
    pub async fn probe_all(&self, instances: &[Arc<Instance>]) -> Vec<ProbeResult> {
        let checks = instances.iter().map(|instance| self.check(instance));
        futures::future::join_all(checks).await
    }
}
