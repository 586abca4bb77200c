pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod models;
pub mod pipeline;

pub use config::OfiConfig;
pub use data::{Snapshot, SnapshotPair};
pub use engine::{FeatureEngine, PairFeatures};
pub use error::OfiError;
pub use models::*;
