// src/server/mod.rs
pub mod admin;

pub use admin::AdminServer;
