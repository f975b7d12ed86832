// src/discovery/mod.rs
mod catalog;
mod client;
mod consul;
mod instance;

pub use catalog::{CatalogBackend, CatalogEntry, CatalogError, CheckStatus, HealthCheck};
pub use client::DiscoveryClient;
pub use consul::ConsulCatalog;
pub use instance::Instance;
