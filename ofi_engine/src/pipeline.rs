/// pipeline.rs — Batch helpers over a snapshot stream
///
/// Every helper walks consecutive pairs (s₀,s₁), (s₁,s₂), … in stream order
/// and returns one output per pair, so a stream of N snapshots yields N − 1
/// values.  Order is preserved exactly: PCA and OLS results depend on it
/// through floating-point summation order.
use crate::data::{Snapshot, SnapshotPair};
use crate::error::Result;
use crate::models::{
    best_level_ofi, deeper_level_ofi, log_return, raw_ofi, IntegratedOfi,
};

/// Consecutive snapshot pairs.  A depth change mid-stream yields an error item.
pub fn pairs(snapshots: &[Snapshot]) -> impl Iterator<Item = Result<SnapshotPair<'_>>> + '_ {
    snapshots.windows(2).map(|w| SnapshotPair::new(&w[0], &w[1]))
}

/// Raw OFI vector per pair: the training corpus for `IntegratedOfi::train`.
pub fn raw_ofi_rows(snapshots: &[Snapshot], level: usize) -> Result<Vec<Vec<f64>>> {
    pairs(snapshots).map(|p| raw_ofi(&p?, level)).collect()
}

pub fn best_level_series(snapshots: &[Snapshot]) -> Result<Vec<f64>> {
    pairs(snapshots).map(|p| p.map(|p| best_level_ofi(&p))).collect()
}

pub fn deeper_level_series(snapshots: &[Snapshot], level: usize) -> Result<Vec<Vec<f64>>> {
    pairs(snapshots).map(|p| deeper_level_ofi(&p?, level)).collect()
}

pub fn log_return_series(snapshots: &[Snapshot]) -> Result<Vec<f64>> {
    pairs(snapshots).map(|p| p.map(|p| log_return(&p))).collect()
}

pub fn integrated_series(
    model: &IntegratedOfi,
    snapshots: &[Snapshot],
    level: usize,
) -> Result<Vec<f64>> {
    pairs(snapshots).map(|p| model.compute(&p?, level)).collect()
}

/// Parallel predictor / response series for the cross-impact regression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpactSeries {
    /// Best-level OFI per pair
    pub ofi:     Vec<f64>,
    /// Log mid-price return per pair
    pub returns: Vec<f64>,
}

pub fn impact_series(snapshots: &[Snapshot]) -> Result<ImpactSeries> {
    let n = snapshots.len().saturating_sub(1);
    let mut series = ImpactSeries {
        ofi:     Vec::with_capacity(n),
        returns: Vec::with_capacity(n),
    };
    for pair in pairs(snapshots) {
        let pair = pair?;
        series.ofi.push(best_level_ofi(&pair));
        series.returns.push(log_return(&pair));
    }
    Ok(series)
}
