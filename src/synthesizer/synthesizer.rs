// src/synthesizer/synthesizer.rs
use super::publisher::SnapshotPublisher;
use super::snapshot::{RoutingSnapshot, RoutingTable};
use crate::config::SynthesizerConfig;
use crate::discovery::DiscoveryClient;
use crate::metrics::{MetricsCollector, Timer};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published(u64),
    /// Another cycle was still running.
    Skipped,
    /// The cycle aborted; the previous snapshot stays published.
    Failed,
}

/// Periodically rebuilds the routing snapshot from discovered instances.
pub struct ConfigSynthesizer {
    discovery: Arc<DiscoveryClient>,
    publisher: SnapshotPublisher,
    config: SynthesizerConfig,
    in_flight: Mutex<()>,
    metrics: Option<Arc<MetricsCollector>>,
}

/// Handle to the background refresh loop.
pub struct SynthesisTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ConfigSynthesizer {
    pub fn new(
        discovery: Arc<DiscoveryClient>,
        config: SynthesizerConfig,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            discovery,
            publisher: SnapshotPublisher::new(),
            config,
            in_flight: Mutex::new(()),
            metrics,
        }
    }

    /// Builds the synthesizer and runs the first cycle before returning, so the
    /// first reader already sees discovered routes.
    pub async fn bootstrap(
        discovery: Arc<DiscoveryClient>,
        config: SynthesizerConfig,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Arc<Self> {
        let synthesizer = Arc::new(Self::new(discovery, config, metrics));
        synthesizer.refresh().await;
        synthesizer
    }

    pub fn get_config(&self) -> Arc<RoutingSnapshot> {
        self.publisher.current()
    }

    /// Receives the version of every newly published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.publisher.subscribe()
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Synthesis cycle already running, skipping");
            if let Some(metrics) = &self.metrics {
                metrics.record_synthesis_skipped();
            }
            return RefreshOutcome::Skipped;
        };

        let timer = Timer::new();
        let instances = self.discovery.fetch_all_healthy().await;

        match RoutingTable::build(&instances, self.config.cluster_strategy) {
            Ok(table) => {
                let routes = table.routes.len();
                let clusters = table.clusters.len();
                let snapshot = self.publisher.publish(table);

                info!(
                    "Published routing snapshot v{}: {} routes, {} clusters, {} instances",
                    snapshot.version,
                    routes,
                    clusters,
                    instances.len()
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_synthesis_published(
                        snapshot.version,
                        routes,
                        clusters,
                        instances.len(),
                        timer.elapsed(),
                    );
                }
                RefreshOutcome::Published(snapshot.version)
            }
            Err(e) => {
                error!(
                    "Routing synthesis failed, keeping snapshot v{}: {}",
                    self.publisher.current().version,
                    e
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_synthesis_failed(timer.elapsed());
                }
                RefreshOutcome::Failed
            }
        }
    }

    /// Starts the periodic loop. The first tick fires one interval from now.
    pub fn spawn(self: &Arc<Self>) -> SynthesisTask {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let synthesizer = self.clone();
        let handle = tokio::spawn(async move { synthesizer.run(shutdown_rx).await });

        SynthesisTask {
            shutdown_tx,
            handle,
        }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let period = self.config.interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Starting routing synthesis with interval: {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Routing synthesis shutting down");
                        break;
                    }
                }
            }
        }
    }
}

impl SynthesisTask {
    /// Stops scheduling new cycles and waits for the loop to exit; an
    /// in-flight cycle completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!("Routing synthesis task ended abnormally: {}", e);
        }
    }
}
