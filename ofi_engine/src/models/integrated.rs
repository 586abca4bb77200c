/// models/integrated.rs — Integrated OFI via first principal component
/// ```text
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL DEFINITION
/// ─────────────────────────────────────────────────────────────────────────
///
///   Training corpus: X ∈ ℝ^{n×M}, row t = raw OFI vector of pair t.
///
///   1. Centre columns:       X̃ = X − 1·x̄ᵀ
///   2. Sample covariance:    Σ = X̃ᵀX̃ / (n − 1)
///   3. Eigendecompose Σ, take the eigenvector v₁ of the LARGEST eigenvalue λ₁.
///   4. L1-normalise:         w₁ = v₁ / ‖v₁‖₁        (Σ|w₁,m| = 1)
///
///   Integrated OFI of a new pair:
///
///       ofi^I = w₁ᵀ · OFI_{1..M}
///
///   Explained variance ratio:  λ₁ / Σ_m λ_m
///
/// SIGN: eigenvectors are defined up to ±1 and different solvers disagree.
/// After normalisation w₁ is flipped so that Σ w₁,m ≥ 0.  When Σ w₁,m is
/// exactly 0 the solver's sign is kept as returned.
/// TIES: among equal largest eigenvalues the lowest index wins.
/// ─────────────────────────────────────────────────────────────────────────
/// ```

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::SnapshotPair;
use crate::error::{OfiError, Result};
use crate::models::ofi::raw_ofi;

/// Iteration cap for the symmetric eigensolver (None on non-convergence).
const EIGEN_MAX_ITER: usize = 10_000;

/// Trained projection w₁ plus training diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProjectionRecord")]
pub struct ProjectionVector {
    /// L1-normalised weights, best level first
    weights: Vec<f64>,
    /// λ₁, when known
    eigenvalue: Option<f64>,
    /// λ₁ / tr(Σ), when known
    explained_variance: Option<f64>,
}

#[derive(Deserialize)]
struct ProjectionRecord {
    weights: Vec<f64>,
    eigenvalue: Option<f64>,
    explained_variance: Option<f64>,
}

impl TryFrom<ProjectionRecord> for ProjectionVector {
    type Error = OfiError;

    fn try_from(r: ProjectionRecord) -> Result<Self> {
        Ok(Self {
            weights: l1_normalise(r.weights)?,
            eigenvalue: r.eigenvalue,
            explained_variance: r.explained_variance,
        })
    }
}

impl ProjectionVector {
    /// Restore a projection from externally stored weights.
    /// The weights are re-normalised to unit L1 norm; their sign is kept.
    pub fn from_weights(weights: Vec<f64>) -> Result<Self> {
        Ok(Self {
            weights: l1_normalise(weights)?,
            eigenvalue: None,
            explained_variance: None,
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of levels the projection was trained on.
    pub fn level(&self) -> usize {
        self.weights.len()
    }

    pub fn eigenvalue(&self) -> Option<f64> {
        self.eigenvalue
    }

    pub fn explained_variance(&self) -> Option<f64> {
        self.explained_variance
    }

    /// w₁ᵀ · ofi
    pub fn project(&self, ofi: &[f64]) -> Result<f64> {
        if ofi.len() != self.level() {
            return Err(OfiError::ProjectionLevelMismatch {
                weights: self.level(),
                level:   ofi.len(),
            });
        }
        let w = DVector::from_column_slice(&self.weights);
        Ok(w.dot(&DVector::from_column_slice(ofi)))
    }
}

fn l1_normalise(weights: Vec<f64>) -> Result<Vec<f64>> {
    let w = DVector::from_vec(weights);
    let l1 = w.lp_norm(1);
    // also rejects NaN and empty input
    if !(l1 > 0.0 && l1.is_finite()) {
        return Err(OfiError::ZeroProjection);
    }
    Ok(w.unscale(l1).iter().copied().collect())
}

/// Lifecycle of an `IntegratedOfi` model.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TrainingState {
    #[default]
    Untrained,
    Trained(ProjectionVector),
}

/// Integrated OFI calculator.  `train` first, then `compute`.
#[derive(Debug, Clone, Default)]
pub struct IntegratedOfi {
    state: TrainingState,
}

impl IntegratedOfi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap previously trained (e.g. checkpointed) weights.
    pub fn from_projection(projection: ProjectionVector) -> Self {
        Self { state: TrainingState::Trained(projection) }
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, TrainingState::Trained(_))
    }

    pub fn projection(&self) -> Option<&ProjectionVector> {
        match &self.state {
            TrainingState::Trained(p) => Some(p),
            TrainingState::Untrained => None,
        }
    }

    /// Fit w₁ on `corpus` (rows = observations, columns = levels).
    ///
    /// On error the previous state is left untouched; on success it is
    /// replaced in one assignment.
    pub fn train(&mut self, corpus: &[Vec<f64>], level: usize) -> Result<&ProjectionVector> {
        let projection = first_principal_component(corpus, level)?;
        info!(
            "Integrated OFI trained: rows={} level={} λ₁={:.6e} explained={:.2}%",
            corpus.len(),
            level,
            projection.eigenvalue.unwrap_or(f64::NAN),
            projection.explained_variance.unwrap_or(f64::NAN) * 100.0,
        );
        self.state = TrainingState::Trained(projection);
        self.projection().ok_or(OfiError::NotTrained)
    }

    /// Integrated OFI of one pair:  w₁ᵀ · raw_ofi(pair, level)
    pub fn compute(&self, pair: &SnapshotPair<'_>, level: usize) -> Result<f64> {
        let projection = self.projection().ok_or(OfiError::NotTrained)?;
        if level != projection.level() {
            return Err(OfiError::ProjectionLevelMismatch {
                weights: projection.level(),
                level,
            });
        }
        projection.project(&raw_ofi(pair, level)?)
    }
}

fn first_principal_component(corpus: &[Vec<f64>], level: usize) -> Result<ProjectionVector> {
    if level == 0 {
        return Err(OfiError::LevelOutOfRange {
            level,
            depth: corpus.first().map_or(0, Vec::len),
        });
    }
    let n = corpus.len();
    if n < 2 {
        return Err(OfiError::InsufficientObservations(n));
    }
    for (row, obs) in corpus.iter().enumerate() {
        if obs.len() != level {
            return Err(OfiError::RowLengthMismatch { row, len: obs.len(), expected: level });
        }
        if obs.iter().any(|v| !v.is_finite()) {
            return Err(OfiError::NonFiniteObservation { row });
        }
    }

    let mut x = DMatrix::from_fn(n, level, |r, c| corpus[r][c]);
    for mut col in x.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }

    // Σ = X̃ᵀX̃ / (n − 1)
    let cov = (x.transpose() * &x) / (n as f64 - 1.0);

    let eigen = SymmetricEigen::try_new(cov, f64::EPSILON, EIGEN_MAX_ITER)
        .ok_or(OfiError::EigenDecomposition)?;

    let idx = eigen.eigenvalues.imax();
    let eigenvalue = eigen.eigenvalues[idx];
    let total = eigen.eigenvalues.sum();
    let explained_variance = if total > 0.0 { eigenvalue / total } else { 0.0 };
    debug!("covariance eigenvalues: {:?}", eigen.eigenvalues.as_slice());

    let mut weights = l1_normalise(eigen.eigenvectors.column(idx).iter().copied().collect())?;
    if weights.iter().sum::<f64>() < 0.0 {
        weights.iter_mut().for_each(|w| *w = -*w);
    }

    Ok(ProjectionVector {
        weights,
        eigenvalue: Some(eigenvalue),
        explained_variance: Some(explained_variance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Snapshot;

    /// Rank-one corpus: every row is a multiple of `dir`.
    fn rank_one_corpus(dir: &[f64], n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|t| {
                let scale = ((t * 7) % 11) as f64 - 5.0;
                dir.iter().map(|d| scale * d).collect()
            })
            .collect()
    }

    /// Two-factor corpus with a dominant first direction.
    fn noisy_corpus(n: usize) -> Vec<Vec<f64>> {
        (0..n)
            .map(|t| {
                let a = ((t * 13) % 17) as f64 - 8.0;
                let b = ((t * 5) % 7) as f64 - 3.0;
                vec![3.0 * a + 0.1 * b, 2.0 * a - 0.2 * b, a + 0.3 * b]
            })
            .collect()
    }

    fn pair_snaps() -> (Snapshot, Snapshot) {
        let prev = Snapshot::new("t0", vec![100.0, 99.5, 99.0], vec![101.0, 101.5, 102.0],
                                 vec![10.0, 20.0, 30.0], vec![5.0, 15.0, 25.0]).unwrap();
        let cur  = Snapshot::new("t1", vec![100.5, 99.5, 98.5], vec![100.5, 102.0, 102.0],
                                 vec![4.0, 26.0, 12.0], vec![7.0, 9.0, 20.0]).unwrap();
        (prev, cur)
    }

    #[test]
    fn compute_before_train_fails() {
        let model = IntegratedOfi::new();
        let (prev, cur) = pair_snaps();
        let pair = SnapshotPair::new(&prev, &cur).unwrap();
        assert_eq!(model.compute(&pair, 3), Err(OfiError::NotTrained));
        assert_eq!(model.state(), &TrainingState::Untrained);
    }

    #[test]
    fn projection_is_l1_normalised() {
        let mut model = IntegratedOfi::new();
        let w = model.train(&noisy_corpus(200), 3).unwrap();
        let l1: f64 = w.weights().iter().map(|v| v.abs()).sum();
        assert!((l1 - 1.0).abs() < 1e-12, "‖w‖₁ = {l1}");
        assert!(model.is_trained());
    }

    #[test]
    fn recovers_dominant_direction() {
        let dir = [1.0, 2.0, 0.5];
        let mut model = IntegratedOfi::new();
        let w = model.train(&rank_one_corpus(&dir, 50), 3).unwrap();
        for (got, d) in w.weights().iter().zip(dir.iter()) {
            let want = d / 3.5;
            assert!((got.abs() - want).abs() < 1e-9, "|w| = {}, want {want}", got.abs());
        }
        let explained = w.explained_variance().unwrap();
        assert!((explained - 1.0).abs() < 1e-9, "explained = {explained}");
    }

    #[test]
    fn weights_are_flipped_to_non_negative_sum() {
        // principal direction sums to −2.5 before the flip
        let dir = [-1.0, -2.0, 0.5];
        let mut model = IntegratedOfi::new();
        let w = model.train(&rank_one_corpus(&dir, 50), 3).unwrap();
        let sum: f64 = w.weights().iter().sum();
        assert!(sum >= 0.0, "Σw = {sum}");
        for (got, d) in w.weights().iter().zip(dir.iter()) {
            let want = -d / 3.5;
            assert!((got - want).abs() < 1e-9, "w = {got}, want {want}");
        }
    }

    #[test]
    fn identical_rows_explain_nothing() {
        let corpus = vec![vec![3.0, -1.0, 2.0]; 20];
        let mut model = IntegratedOfi::new();
        let w = model.train(&corpus, 3).unwrap();
        assert_eq!(w.explained_variance(), Some(0.0));
        let l1: f64 = w.weights().iter().map(|v| v.abs()).sum();
        assert!((l1 - 1.0).abs() < 1e-12, "‖w‖₁ = {l1}");
    }

    #[test]
    fn compute_is_deterministic_for_fixed_model() {
        let mut model = IntegratedOfi::new();
        model.train(&noisy_corpus(120), 3).unwrap();
        let (prev, cur) = pair_snaps();
        let pair = SnapshotPair::new(&prev, &cur).unwrap();
        let a = model.compute(&pair, 3).unwrap();
        let b = model.compute(&pair, 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.signum(), b.signum());
    }

    #[test]
    fn compute_is_dot_product_with_raw_ofi() {
        let projection = ProjectionVector::from_weights(vec![1.0, 2.0, 1.0]).unwrap();
        assert_eq!(projection.weights(), &[0.25, 0.5, 0.25]);
        let model = IntegratedOfi::from_projection(projection);
        let (prev, cur) = pair_snaps();
        let pair = SnapshotPair::new(&prev, &cur).unwrap();
        // raw OFI = [−3, 15, −7]
        let v = model.compute(&pair, 3).unwrap();
        assert!((v - (-0.75 + 7.5 - 1.75)).abs() < 1e-12, "v = {v}");
    }

    #[test]
    fn compute_rejects_other_level() {
        let model = IntegratedOfi::from_projection(ProjectionVector::from_weights(vec![1.0, 1.0]).unwrap());
        let (prev, cur) = pair_snaps();
        let pair = SnapshotPair::new(&prev, &cur).unwrap();
        assert_eq!(
            model.compute(&pair, 3),
            Err(OfiError::ProjectionLevelMismatch { weights: 2, level: 3 })
        );
    }

    #[test]
    fn rejects_bad_corpus() {
        let mut model = IntegratedOfi::new();
        assert_eq!(
            model.train(&[vec![1.0, 2.0]], 2).unwrap_err(),
            OfiError::InsufficientObservations(1)
        );
        assert_eq!(
            model.train(&[vec![1.0, 2.0], vec![1.0]], 2).unwrap_err(),
            OfiError::RowLengthMismatch { row: 1, len: 1, expected: 2 }
        );
        assert_eq!(
            model.train(&[vec![1.0, 2.0], vec![f64::NAN, 0.0]], 2).unwrap_err(),
            OfiError::NonFiniteObservation { row: 1 }
        );
        assert!(matches!(
            model.train(&[vec![], vec![]], 0).unwrap_err(),
            OfiError::LevelOutOfRange { level: 0, .. }
        ));
        assert!(!model.is_trained());
    }

    #[test]
    fn failed_retrain_keeps_previous_projection() {
        let mut model = IntegratedOfi::new();
        let before = model.train(&noisy_corpus(60), 3).unwrap().clone();
        assert!(model.train(&[vec![1.0, 2.0, 3.0]], 3).is_err());
        assert_eq!(model.projection(), Some(&before));
    }

    #[test]
    fn retrain_replaces_projection() {
        let mut model = IntegratedOfi::new();
        model.train(&noisy_corpus(60), 3).unwrap();
        let w = model.train(&rank_one_corpus(&[1.0, 1.0], 10), 2).unwrap();
        assert_eq!(w.level(), 2);
        assert!((w.weights()[0].abs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn projection_checkpoint_restores() {
        let mut model = IntegratedOfi::new();
        let trained = model.train(&noisy_corpus(80), 3).unwrap().clone();
        let json = serde_json::to_string(&trained).unwrap();
        let restored: ProjectionVector = serde_json::from_str(&json).unwrap();
        for (a, b) in restored.weights().iter().zip(trained.weights().iter()) {
            assert!((a - b).abs() < 1e-15);
        }
        assert_eq!(restored.eigenvalue(), trained.eigenvalue());

        let zero = r#"{"weights":[0.0,0.0],"eigenvalue":null,"explained_variance":null}"#;
        assert!(serde_json::from_str::<ProjectionVector>(zero).is_err());
    }
}
