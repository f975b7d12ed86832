// src/synthesizer/snapshot.rs
use crate::config::StrategyKind;
use crate::discovery::Instance;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error(
        "Service {service} reports instance id {instance_id} more than once; routing left unchanged"
    )]
    DuplicateDestination { service: String, instance_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PathTransform {
    #[serde(rename = "PathRemovePrefix")]
    RemovePrefix(String),
}

impl PathTransform {
    pub fn apply(&self, path: &str) -> String {
        match self {
            PathTransform::RemovePrefix(prefix) => match strip_segment_prefix(path, prefix) {
                Some("") => "/".to_string(),
                Some(rest) => rest.to_string(),
                None => path.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteConfig {
    pub route_id: String,
    pub cluster_id: String,
    pub path: String,
    pub transforms: Vec<PathTransform>,
}

impl RouteConfig {
    /// `/{lowercased name}/**`, with the prefix stripped before forwarding.
    pub fn for_service(service_name: &str) -> Self {
        let prefix = format!("/{}", service_name.to_lowercase());
        Self {
            route_id: format!("{}-route", service_name),
            cluster_id: service_name.to_string(),
            path: format!("{}/**", prefix),
            transforms: vec![PathTransform::RemovePrefix(prefix)],
        }
    }

    pub fn path_prefix(&self) -> &str {
        self.path.strip_suffix("/**").unwrap_or(&self.path)
    }

    /// Segment-aware, case-insensitive prefix match.
    pub fn matches(&self, request_path: &str) -> bool {
        strip_segment_prefix(request_path, self.path_prefix()).is_some()
    }

    pub fn rewrite(&self, request_path: &str) -> String {
        self.transforms
            .iter()
            .fold(request_path.to_string(), |path, transform| transform.apply(&path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationConfig {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterConfig {
    pub cluster_id: String,
    pub destinations: BTreeMap<String, DestinationConfig>,
    pub load_balancing: StrategyKind,
}

/// Routes and clusters of one synthesis cycle, before publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutingTable {
    pub routes: Vec<RouteConfig>,
    pub clusters: Vec<ClusterConfig>,
}

impl RoutingTable {
    /// One route and one cluster per service, ordered by service name.
    /// Services absent from `instances` get neither.
    ///
    /// Instance ids must be unique within a service. Consul assigns the
    /// service name as id to registrations without an explicit one, so two
    /// such nodes collide here and every cycle is rejected until one is
    /// re-registered.
    pub fn build(
        instances: &[Arc<Instance>],
        load_balancing: StrategyKind,
    ) -> Result<Self, SynthesisError> {
        let mut groups: BTreeMap<&str, Vec<&Arc<Instance>>> = BTreeMap::new();
        for instance in instances {
            groups
                .entry(instance.service_name.as_str())
                .or_default()
                .push(instance);
        }

        let mut table = RoutingTable::default();
        for (service_name, members) in groups {
            let mut destinations = BTreeMap::new();
            for instance in members {
                let previous = destinations.insert(
                    instance.id.clone(),
                    DestinationConfig {
                        address: instance.base_url(),
                    },
                );
                if previous.is_some() {
                    return Err(SynthesisError::DuplicateDestination {
                        service: service_name.to_string(),
                        instance_id: instance.id.clone(),
                    });
                }
            }

            table.clusters.push(ClusterConfig {
                cluster_id: service_name.to_string(),
                destinations,
                load_balancing,
            });
            table.routes.push(RouteConfig::for_service(service_name));
        }

        Ok(table)
    }

    pub fn cluster(&self, cluster_id: &str) -> Option<&ClusterConfig> {
        self.clusters.iter().find(|c| c.cluster_id == cluster_id)
    }

    pub fn instance_count(&self) -> usize {
        self.clusters.iter().map(|c| c.destinations.len()).sum()
    }
}

/// Fires once a newer snapshot replaces the one that carries it.
#[derive(Debug, Clone)]
pub struct ChangeSignal {
    version: u64,
    receiver: watch::Receiver<u64>,
}

impl ChangeSignal {
    pub(crate) fn new(version: u64, receiver: watch::Receiver<u64>) -> Self {
        Self { version, receiver }
    }

    pub fn has_changed(&self) -> bool {
        *self.receiver.borrow() != self.version
    }

    /// Resolves `true` once superseded, `false` if the publisher went away first.
    pub async fn changed(&self) -> bool {
        let mut receiver = self.receiver.clone();
        let version = self.version;
        let changed = receiver.wait_for(|current| *current != version).await.is_ok();
        changed
    }
}

/// Immutable, versioned routing configuration handed to the proxy runtime.
#[derive(Debug, Serialize)]
pub struct RoutingSnapshot {
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub table: RoutingTable,
    #[serde(skip)]
    pub change_signal: ChangeSignal,
}

impl RoutingSnapshot {
    pub fn routes(&self) -> &[RouteConfig] {
        &self.table.routes
    }

    pub fn clusters(&self) -> &[ClusterConfig] {
        &self.table.clusters
    }

    /// First route matching `request_path`, with its cluster.
    pub fn route_for(&self, request_path: &str) -> Option<(&RouteConfig, &ClusterConfig)> {
        self.table
            .routes
            .iter()
            .find(|route| route.matches(request_path))
            .and_then(|route| self.table.cluster(&route.cluster_id).map(|c| (route, c)))
    }
}

fn strip_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let head = path.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &path[prefix.len()..];
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, service: &str, address: &str) -> Arc<Instance> {
        Arc::new(Instance::new(id, service, address, 9001))
    }

    #[test]
    fn test_single_service_table() {
        let instances = vec![
            instance("i1", "svc1", "10.0.0.1"),
            instance("i2", "svc1", "10.0.0.2"),
        ];
        let table = RoutingTable::build(&instances, StrategyKind::RoundRobin).unwrap();

        assert_eq!(table.routes.len(), 1);
        assert_eq!(table.clusters.len(), 1);

        let route = &table.routes[0];
        assert_eq!(route.route_id, "svc1-route");
        assert_eq!(route.cluster_id, "svc1");
        assert_eq!(route.path, "/svc1/**");
        assert_eq!(route.transforms, vec![PathTransform::RemovePrefix("/svc1".into())]);

        let cluster = &table.clusters[0];
        assert_eq!(cluster.cluster_id, "svc1");
        assert_eq!(cluster.destinations["i1"].address, "http://10.0.0.1:9001");
        assert_eq!(cluster.destinations["i2"].address, "http://10.0.0.2:9001");
    }

    #[test]
    fn test_route_path_is_lowercased_but_ids_are_not() {
        let table = RoutingTable::build(&[instance("a", "Orders", "10.0.0.1")], StrategyKind::Random)
            .unwrap();

        assert_eq!(table.routes[0].route_id, "Orders-route");
        assert_eq!(table.routes[0].path, "/orders/**");
        assert_eq!(table.clusters[0].cluster_id, "Orders");
        assert_eq!(table.clusters[0].load_balancing, StrategyKind::Random);
    }

    #[test]
    fn test_empty_input_builds_empty_table() {
        let table = RoutingTable::build(&[], StrategyKind::RoundRobin).unwrap();
        assert!(table.routes.is_empty());
        assert!(table.clusters.is_empty());
    }

    #[test]
    fn test_duplicate_instance_id_is_rejected() {
        let instances = vec![
            instance("i1", "svc1", "10.0.0.1"),
            instance("i1", "svc1", "10.0.0.2"),
        ];
        assert_eq!(
            RoutingTable::build(&instances, StrategyKind::RoundRobin).unwrap_err(),
            SynthesisError::DuplicateDestination {
                service: "svc1".into(),
                instance_id: "i1".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_error_names_service_and_id() {
        // Consul registrations without an explicit id share the service name.
        let instances = vec![
            instance("web", "web", "10.0.0.1"),
            instance("web", "web", "10.0.0.2"),
        ];
        let message = RoutingTable::build(&instances, StrategyKind::RoundRobin)
            .unwrap_err()
            .to_string();
        assert_eq!(
            message,
            "Service web reports instance id web more than once; routing left unchanged"
        );
    }

    #[test]
    fn test_same_id_in_different_services_is_fine() {
        let instances = vec![
            instance("i1", "svc1", "10.0.0.1"),
            instance("i1", "svc2", "10.0.0.2"),
        ];
        let table = RoutingTable::build(&instances, StrategyKind::RoundRobin).unwrap();
        assert_eq!(table.clusters.len(), 2);
        assert_eq!(table.instance_count(), 2);
    }

    #[test]
    fn test_route_matching_and_rewrite() {
        let route = RouteConfig::for_service("svc1");

        assert!(route.matches("/svc1"));
        assert!(route.matches("/svc1/orders/7"));
        assert!(route.matches("/SVC1/orders"));
        assert!(!route.matches("/svc10/orders"));
        assert!(!route.matches("/other"));

        assert_eq!(route.rewrite("/svc1/orders/7"), "/orders/7");
        assert_eq!(route.rewrite("/svc1"), "/");
        assert_eq!(route.rewrite("/other"), "/other");
    }
}
