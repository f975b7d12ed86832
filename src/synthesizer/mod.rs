// src/synthesizer/mod.rs
mod publisher;
mod snapshot;
mod synthesizer;

pub use publisher::SnapshotPublisher;
pub use snapshot::{
    ChangeSignal, ClusterConfig, DestinationConfig, PathTransform, RouteConfig, RoutingSnapshot,
    RoutingTable, SynthesisError,
};
pub use synthesizer::{ConfigSynthesizer, RefreshOutcome, SynthesisTask};
