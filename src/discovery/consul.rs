// src/discovery/consul.rs
use super::catalog::{CatalogBackend, CatalogEntry, CatalogError, CheckStatus, HealthCheck};
use crate::config::CatalogConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

const TOKEN_HEADER: &str = "X-Consul-Token";

/// Consul HTTP API catalog backend.
pub struct ConsulCatalog {
    client: Client,
    base: Url,
    timeout: Duration,
    datacenter: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthServiceEntry {
    #[serde(default)]
    node: Option<NodeRecord>,
    service: ServiceRecord,
    #[serde(default)]
    checks: Vec<CheckRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeRecord {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRecord {
    #[serde(rename = "ID")]
    id: String,
    service: String,
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    weights: Option<WeightsRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WeightsRecord {
    passing: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CheckRecord {
    #[serde(rename = "CheckID", default)]
    check_id: String,
    status: String,
}

impl From<HealthServiceEntry> for CatalogEntry {
    fn from(entry: HealthServiceEntry) -> Self {
        let service = entry.service;
        // Consul leaves the service address empty when it equals the node address.
        let address = if service.address.is_empty() {
            entry.node.map(|node| node.address).unwrap_or_default()
        } else {
            service.address
        };

        CatalogEntry {
            id: service.id,
            service_name: service.service,
            address,
            port: service.port,
            tags: service.tags.unwrap_or_default(),
            weight: service.weights.map(|w| w.passing),
            checks: entry
                .checks
                .into_iter()
                .map(|check| HealthCheck {
                    id: check.check_id,
                    status: CheckStatus::parse(&check.status),
                })
                .collect(),
        }
    }
}

impl ConsulCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base: config.address.clone(),
            timeout: config.timeout(),
            datacenter: config.datacenter.clone(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, url: Url) -> RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(dc) = &self.datacenter {
            request = request.query(&[("dc", dc.as_str())]);
        }
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token.as_str());
        }
        request
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, CatalogError> {
        let send = async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CatalogError::UnexpectedStatus {
                    operation: operation.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok::<T, CatalogError>(response.json::<T>().await?)
        };

        match timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout {
                operation: operation.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

#[async_trait]
impl CatalogBackend for ConsulCatalog {
    async fn list_services(&self) -> Result<Vec<String>, CatalogError> {
        let url = self.endpoint(&["v1", "catalog", "services"])?;
        let services: BTreeMap<String, serde_json::Value> =
            self.get_json("list services", self.request(url)).await?;

        debug!("Consul catalog lists {} services", services.len());
        Ok(services.into_keys().collect())
    }

    async fn healthy_instances(&self, service_name: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
        let url = self.endpoint(&["v1", "health", "service", service_name])?;
        let request = self.request(url).query(&[("passing", "true")]);
        let entries: Vec<HealthServiceEntry> = self
            .get_json(&format!("health of {}", service_name), request)
            .await?;

        Ok(entries.into_iter().map(CatalogEntry::from).collect())
    }

    fn name(&self) -> &'static str {
        "consul"
    }
}
