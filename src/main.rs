// src/main.rs
use anyhow::{Context, Result};
use rust_discovery_gateway::{
    config,
    discovery::{ConsulCatalog, DiscoveryClient},
    health::HealthProber,
    load_balancer::LoadBalancer,
    metrics::MetricsRegistry,
    server::AdminServer,
    synthesizer::ConfigSynthesizer,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rust_discovery_gateway=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = Arc::new(MetricsRegistry::new()?);
    let metrics = metrics_registry.collector();

    // Discovery stack
    let catalog = ConsulCatalog::new(&config.catalog).context("Failed to create catalog client")?;
    let prober = HealthProber::new(&config.probe, Some(metrics.clone()))
        .context("Failed to create health prober")?;
    let load_balancer = Arc::new(LoadBalancer::with_strategies(
        config.load_balancer.strategies.iter().copied(),
    ));
    let discovery = Arc::new(
        DiscoveryClient::new(
            Arc::new(catalog),
            config.catalog.excluded_services.clone(),
            prober,
        )
        .with_load_balancer(load_balancer)
        .with_default_strategy(config.load_balancer.default_strategy)
        .with_metrics(metrics.clone()),
    );

    info!("Discovering services from {}", config.catalog.address);
    let synthesizer =
        ConfigSynthesizer::bootstrap(discovery, config.synthesizer.clone(), Some(metrics)).await;
    let synthesis = synthesizer.spawn();

    let (stop_tx, stop_rx) = watch::channel(false);

    // Start admin server if enabled
    let admin = if config.admin.enabled {
        let server = AdminServer::new(config.admin.clone(), synthesizer.clone(), metrics_registry);
        let mut stop = stop_rx.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop.wait_for(|stopped| *stopped).await;
            };
            if let Err(e) = server.serve(shutdown).await {
                error!("Admin server error: {:#}", e);
            }
        }))
    } else {
        None
    };

    // Log every routing change
    let reporter = {
        let synthesizer = synthesizer.clone();
        let mut versions = synthesizer.subscribe();
        let mut stop = stop_rx;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = versions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = synthesizer.get_config();
                        for route in snapshot.routes() {
                            info!("v{} route {} -> cluster {}", snapshot.version, route.path, route.cluster_id);
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
        })
    };

    shutdown_signal().await;

    synthesis.shutdown().await;
    let _ = stop_tx.send(true);
    if let Some(admin) = admin {
        let _ = admin.await;
    }
    let _ = reporter.await;

    info!("Gateway stopped");
    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
