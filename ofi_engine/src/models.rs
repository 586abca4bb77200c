pub mod cross_impact;
pub mod integrated;
pub mod ofi;

pub use cross_impact::{log_return, CrossImpactModel, RegressionModel};
pub use integrated::{IntegratedOfi, ProjectionVector, TrainingState};
pub use ofi::{average_depth, best_level_ofi, deeper_level_ofi, level_delta, raw_ofi, LevelDelta};
