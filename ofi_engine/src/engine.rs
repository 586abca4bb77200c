/// engine.rs — Feature engine
///
/// Ties configuration to the feature models:
///
///   history (Vec<Snapshot>)
///        │
///        ├─ first `training_window` snapshots → raw OFI corpus → IntegratedOfi::train
///        └─ first `impact_window` snapshots   → (OFI₁, r) series → CrossImpactModel::fit
///
///   live pair ──► features(pair) ──► PairFeatures { best, deeper, integrated, log_return }
///
/// Every snapshot reaching the engine must carry exactly `book_depth` levels.
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::OfiConfig;
use crate::data::{Snapshot, SnapshotPair};
use crate::error::{OfiError, Result};
use crate::models::{
    best_level_ofi, deeper_level_ofi, log_return, CrossImpactModel, IntegratedOfi,
    ProjectionVector, RegressionModel,
};
use crate::pipeline::{impact_series, pairs, raw_ofi_rows};

/// All features of one snapshot pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFeatures {
    /// Timestamp of the current snapshot
    pub timestamp:  String,
    pub best:       f64,
    pub deeper:     Vec<f64>,
    /// `None` until the integrated model has been trained
    pub integrated: Option<f64>,
    pub log_return: f64,
}

#[derive(Debug, Clone)]
pub struct FeatureEngine {
    cfg:        OfiConfig,
    integrated: IntegratedOfi,
}

impl FeatureEngine {
    pub fn new(cfg: OfiConfig) -> Self {
        Self { cfg, integrated: IntegratedOfi::new() }
    }

    pub fn config(&self) -> &OfiConfig {
        &self.cfg
    }

    pub fn integrated(&self) -> &IntegratedOfi {
        &self.integrated
    }

    fn check_book_depth(&self, depth: usize) -> Result<()> {
        if depth != self.cfg.book_depth {
            return Err(OfiError::BookDepthMismatch { depth, expected: self.cfg.book_depth });
        }
        Ok(())
    }

    /// Train integrated OFI on the leading `training_window` snapshots.
    pub fn train_integrated(&mut self, history: &[Snapshot]) -> Result<&ProjectionVector> {
        let window = &history[..history.len().min(self.cfg.training_window)];
        window.iter().try_for_each(|s| self.check_book_depth(s.depth()))?;
        let corpus = raw_ofi_rows(window, self.cfg.integrated_level)?;
        info!(
            "Building integrated OFI corpus: {} snapshots → {} rows × {} levels",
            window.len(),
            corpus.len(),
            self.cfg.integrated_level
        );
        self.integrated.train(&corpus, self.cfg.integrated_level)
    }

    /// Fit the cross-impact line on the leading `impact_window` snapshots.
    pub fn fit_cross_impact(&self, history: &[Snapshot]) -> Result<RegressionModel> {
        let window = &history[..history.len().min(self.cfg.impact_window)];
        window.iter().try_for_each(|s| self.check_book_depth(s.depth()))?;
        let series = impact_series(window)?;
        let model = CrossImpactModel::fit(&series.ofi, &series.returns);
        info!(
            "Cross-impact fit on {} pairs: α={:.6e} β={:.6e}",
            series.ofi.len(),
            model.intercept,
            model.slope
        );
        Ok(model)
    }

    pub fn features(&self, pair: &SnapshotPair<'_>) -> Result<PairFeatures> {
        self.check_book_depth(pair.depth())?;
        let integrated = if self.integrated.is_trained() {
            Some(self.integrated.compute(pair, self.cfg.integrated_level)?)
        } else {
            None
        };
        Ok(PairFeatures {
            timestamp:  pair.current().timestamp().to_owned(),
            best:       best_level_ofi(pair),
            deeper:     deeper_level_ofi(pair, self.cfg.deeper_level)?,
            integrated,
            log_return: log_return(pair),
        })
    }

    /// Features for every consecutive pair of `snapshots`.
    pub fn process(&self, snapshots: &[Snapshot]) -> Result<Vec<PairFeatures>> {
        pairs(snapshots).map(|p| self.features(&p?)).collect()
    }
}
