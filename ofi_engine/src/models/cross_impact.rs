/// models/cross_impact.rs — Price impact of best-level OFI
/// ```text
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL DEFINITION
/// ─────────────────────────────────────────────────────────────────────────
///
/// LOG RETURN of the mid price between two snapshots:
///
///     m_t = ½·(P_b,1(t) + P_a,1(t))
///     r_t = ln(m_t / m_{t−1})
///
///   m ≤ 0 yields NaN / ±∞; no guard is applied.
///
/// CROSS-IMPACT REGRESSION (contemporaneous, best level):
///
///     r_t = α + β · OFI_1,t + ε_t
///
///   Design X = [1, OFI], normal equations (XᵀX)·[α, β]ᵀ = Xᵀr with
///
///     XᵀX = | n    Σx  |      Xᵀr = | Σr  |
///           | Σx   Σx² |            | Σxr |
///
///   The system is solved on the centred design X̃ = [1, x − x̄], whose
///   normal matrix diag(n, Σ(x − x̄)²) has the same OLS solution and stays
///   well conditioned for predictors with a large offset:
///
///     β = Σ(x − x̄)·r / Σ(x − x̄)²       α = r̄ − β·x̄
///
///   Cholesky on the centred system; a constant predictor (and n = 1) makes
///   it singular, in which case the uncentred XᵀX above is solved by the SVD
///   minimum-norm least-squares solution.
///
///   Empty or length-mismatched input returns α = β = 0 (degenerate-input
///   policy; not a successful fit).
/// ─────────────────────────────────────────────────────────────────────────
/// ```

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::SnapshotPair;

const SVD_MAX_ITER: usize = 1_000;

/// ln(m_current / m_previous)
pub fn log_return(pair: &SnapshotPair<'_>) -> f64 {
    (pair.current().mid_price() / pair.previous().mid_price()).ln()
}

/// Fitted line  r = intercept + slope · OFI.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegressionModel {
    pub intercept: f64,
    pub slope:     f64,
}

impl RegressionModel {
    pub fn predict(&self, ofi: f64) -> f64 {
        self.intercept + self.slope * ofi
    }

    /// Coefficient of determination on (x, y).
    ///
    /// `None` for empty / mismatched input or a constant response.
    pub fn r_squared(&self, x: &[f64], y: &[f64]) -> Option<f64> {
        use statrs::statistics::Statistics;

        if x.is_empty() || x.len() != y.len() {
            return None;
        }
        let n = y.len() as f64;
        let ss_tot = y.iter().population_variance() * n;
        if !(ss_tot > 0.0) {
            return None;
        }
        let ss_res: f64 = x.iter().zip(y.iter())
            .map(|(xi, yi)| (yi - self.predict(*xi)).powi(2))
            .sum();
        Some(1.0 - ss_res / ss_tot)
    }
}

/// OLS of a response series on one OFI predictor plus intercept.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossImpactModel;

impl CrossImpactModel {
    pub fn fit(predictors: &[f64], responses: &[f64]) -> RegressionModel {
        let n = predictors.len();
        if n == 0 || n != responses.len() {
            warn!(
                "cross-impact fit on degenerate input (predictors={}, responses={}); returning zero model",
                n,
                responses.len()
            );
            return RegressionModel::default();
        }

        if predictors.iter().chain(responses.iter()).any(|v| !v.is_finite()) {
            warn!("cross-impact fit input contains non-finite values");
            return RegressionModel { intercept: f64::NAN, slope: f64::NAN };
        }

        let beta = if predictors.iter().all(|x| *x == predictors[0]) {
            solve_uncentred(predictors, responses)
        } else {
            solve_centred(predictors, responses)
        };
        debug!("cross-impact OLS: n={} α={:.6e} β={:.6e}", n, beta[0], beta[1]);
        RegressionModel { intercept: beta[0], slope: beta[1] }
    }
}

/// Cholesky on diag(n, Σ(x − x̄)²); falls back to SVD if that is not positive definite.
fn solve_centred(predictors: &[f64], responses: &[f64]) -> Vector2<f64> {
    let n = predictors.len() as f64;
    let x_bar = predictors.iter().sum::<f64>() / n;

    // Accumulate in stream order
    let (mut sy, mut sdd, mut sdy) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in predictors.iter().zip(responses.iter()) {
        let d = x - x_bar;
        sy  += y;
        sdd += d * d;
        sdy += d * y;
    }
    let xtx = Matrix2::new(n, 0.0, 0.0, sdd);
    let xty = Vector2::new(sy, sdy);

    match xtx.cholesky() {
        Some(chol) => {
            let gamma = chol.solve(&xty);
            // [r̄, β] → [α, β]
            Vector2::new(gamma[0] - gamma[1] * x_bar, gamma[1])
        }
        None => {
            debug!("centred normal matrix not positive definite (Σd²={sdd:.3e})");
            solve_uncentred(predictors, responses)
        }
    }
}

/// Minimum-norm least squares on the raw XᵀX = [[n, Σx], [Σx, Σx²]].
fn solve_uncentred(predictors: &[f64], responses: &[f64]) -> Vector2<f64> {
    let (mut sx, mut sxx, mut sy, mut sxy) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in predictors.iter().zip(responses.iter()) {
        sx  += x;
        sxx += x * x;
        sy  += y;
        sxy += x * y;
    }
    let xtx = Matrix2::new(predictors.len() as f64, sx, sx, sxx);
    let xty = Vector2::new(sy, sxy);

    debug!("singular normal matrix (det={:.3e}); using SVD least squares", xtx.determinant());
    let Some(svd) = xtx.try_svd(true, true, f64::EPSILON, SVD_MAX_ITER) else {
        warn!("SVD did not converge; returning zero model");
        return Vector2::zeros();
    };
    let cutoff = 1e-12 * svd.singular_values.max();
    svd.solve(&xty, cutoff).unwrap_or_else(|e| {
        warn!("SVD solve failed: {e}; returning zero model");
        Vector2::zeros()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Snapshot;

    fn top(bid: f64, ask: f64) -> Snapshot {
        Snapshot::new("t", vec![bid], vec![ask], vec![1.0], vec![1.0]).unwrap()
    }

    #[test]
    fn exact_line() {
        let m = CrossImpactModel::fit(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!(m.intercept.abs() < 1e-9, "α = {}", m.intercept);
        assert!((m.slope - 2.0).abs() < 1e-9, "β = {}", m.slope);
        assert!((m.r_squared(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn line_with_intercept() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 - 7.0).collect();
        let y: Vec<f64> = x.iter().map(|v| 1e-4 + 3e-5 * v).collect();
        let m = CrossImpactModel::fit(&x, &y);
        assert!((m.intercept - 1e-4).abs() < 1e-12, "α = {}", m.intercept);
        assert!((m.slope - 3e-5).abs() < 1e-12, "β = {}", m.slope);
    }

    #[test]
    fn large_offset_predictor_keeps_the_line() {
        let x: Vec<f64> = (0..20).map(|i| 1e6 + i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 1.0 + 0.5 * (v - 1e6)).collect();
        let m = CrossImpactModel::fit(&x, &y);
        assert!((m.slope - 0.5).abs() < 1e-9, "β = {}", m.slope);
        assert!((m.predict(1e6) - 1.0).abs() < 1e-6, "ŷ(1e6) = {}", m.predict(1e6));
        assert!((m.predict(1e6 + 19.0) - 10.5).abs() < 1e-6);
    }

    #[test]
    fn empty_input_is_zero_model() {
        let m = CrossImpactModel::fit(&[], &[]);
        assert_eq!(m, RegressionModel { intercept: 0.0, slope: 0.0 });
    }

    #[test]
    fn mismatched_input_is_zero_model() {
        let m = CrossImpactModel::fit(&[1.0, 2.0], &[1.0]);
        assert_eq!(m, RegressionModel::default());
        assert_eq!(m.r_squared(&[1.0, 2.0], &[1.0]), None);
    }

    #[test]
    fn constant_predictor_fits_mean() {
        let m = CrossImpactModel::fit(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]);
        assert!((m.predict(2.0) - 2.0).abs() < 1e-9, "ŷ = {}", m.predict(2.0));
        assert!(m.intercept.is_finite() && m.slope.is_finite());
    }

    #[test]
    fn single_observation_interpolates() {
        let m = CrossImpactModel::fit(&[3.0], &[6.0]);
        assert!((m.predict(3.0) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_input_surfaces() {
        let m = CrossImpactModel::fit(&[1.0, f64::NAN], &[1.0, 2.0]);
        assert!(m.intercept.is_nan() && m.slope.is_nan());
    }

    #[test]
    fn log_return_of_mid() {
        let prev = top(100.0, 101.0);
        let cur  = top(100.5, 101.5);
        let pair = SnapshotPair::new(&prev, &cur).unwrap();
        let r = log_return(&pair);
        assert!((r - (101.0f64 / 100.5).ln()).abs() < 1e-15, "r = {r}");

        let flat = SnapshotPair::new(&prev, &prev).unwrap();
        assert_eq!(log_return(&flat), 0.0);
    }

    #[test]
    fn log_return_zero_mid_is_non_finite() {
        let prev = top(0.0, 0.0);
        let cur  = top(100.0, 101.0);
        let pair = SnapshotPair::new(&prev, &cur).unwrap();
        assert!(!log_return(&pair).is_finite());
    }
}
