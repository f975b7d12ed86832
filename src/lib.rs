// src/lib.rs
pub mod config;
pub mod discovery;
pub mod health;
pub mod load_balancer;
pub mod metrics;
pub mod server;
pub mod synthesizer;
