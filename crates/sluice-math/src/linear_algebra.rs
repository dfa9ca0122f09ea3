//! Covariance estimation and matrix utilities.
//!
//! Matrices are `nalgebra::DMatrix<f64>`. Series are passed as one slice per
//! variable, all of the same length.

use crate::error::{MathError, MathResult};
use nalgebra::{DMatrix, DVector};

/// Variance below which a series is treated as constant.
pub const ZERO_VARIANCE: f64 = 1e-14;

/// Sample covariance matrix of `series` (one row per variable).
///
/// Two-pass estimator: means are removed before the cross products are
/// accumulated.
pub fn covariance_matrix(series: &[Vec<f64>]) -> MathResult<DMatrix<f64>> {
    let k = series.len();
    if k == 0 {
        return Err(MathError::insufficient_data(1, 0));
    }
    let n = series[0].len();
    if n < 2 {
        return Err(MathError::insufficient_data(2, n));
    }
    if let Some(bad) = series.iter().find(|s| s.len() != n) {
        return Err(MathError::dimension_mismatch(n, bad.len()));
    }

    let centred: Vec<Vec<f64>> = series
        .iter()
        .map(|s| {
            let m = s.iter().sum::<f64>() / n as f64;
            s.iter().map(|v| v - m).collect()
        })
        .collect();

    let mut cov = DMatrix::zeros(k, k);
    for i in 0..k {
        for j in i..k {
            let c: f64 = centred[i]
                .iter()
                .zip(&centred[j])
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / (n - 1) as f64;
            cov[(i, j)] = c;
            cov[(j, i)] = c;
        }
    }

    if cov.iter().any(|v| !v.is_finite()) {
        return Err(MathError::non_finite("covariance"));
    }
    Ok(cov)
}

/// Converts a covariance matrix to a correlation matrix.
///
/// Returns the matrix and the indices of zero-variance variables, whose
/// off-diagonal correlations are set to zero.
pub fn correlation_from_covariance(cov: &DMatrix<f64>) -> MathResult<(DMatrix<f64>, Vec<usize>)> {
    let k = cov.nrows();
    if k != cov.ncols() {
        return Err(MathError::dimension_mismatch(k, cov.ncols()));
    }
    let sd: Vec<f64> = (0..k).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();
    let degenerate: Vec<usize> = (0..k)
        .filter(|&i| cov[(i, i)] <= ZERO_VARIANCE)
        .collect();

    let mut corr = DMatrix::identity(k, k);
    for i in 0..k {
        for j in (i + 1)..k {
            let v = if degenerate.contains(&i) || degenerate.contains(&j) {
                0.0
            } else {
                (cov[(i, j)] / (sd[i] * sd[j])).clamp(-1.0, 1.0)
            };
            corr[(i, j)] = v;
            corr[(j, i)] = v;
        }
    }
    Ok((corr, degenerate))
}

/// Smallest eigenvalue of a symmetric matrix.
pub fn min_eigenvalue(matrix: &DMatrix<f64>) -> MathResult<f64> {
    if matrix.nrows() != matrix.ncols() {
        return Err(MathError::dimension_mismatch(matrix.nrows(), matrix.ncols()));
    }
    if matrix.nrows() == 0 {
        return Err(MathError::insufficient_data(1, 0));
    }
    let eigen = matrix.clone().symmetric_eigen();
    eigen
        .eigenvalues
        .iter()
        .copied()
        .reduce(f64::min)
        .ok_or_else(|| MathError::non_finite("eigenvalues"))
}

/// Minimal shrinkage toward the identity that lifts the smallest eigenvalue
/// of a correlation matrix to `floor`.
///
/// Eigenvalues of `(1 − λ)C + λI` are `(1 − λ)e + λ`, so the required
/// intensity is `(floor − e_min) / (1 − e_min)`. Returns 0 when no shrinkage
/// is needed, otherwise at least `min_shrinkage`.
pub fn shrinkage_intensity(e_min: f64, floor: f64, min_shrinkage: f64) -> f64 {
    if e_min >= floor {
        return 0.0;
    }
    let denom = 1.0 - e_min;
    let lambda = if denom <= 0.0 {
        1.0
    } else {
        (floor - e_min) / denom
    };
    lambda.max(min_shrinkage).clamp(0.0, 1.0)
}

/// `(1 − λ)·C + λ·I`.
pub fn shrink_to_identity(matrix: &DMatrix<f64>, lambda: f64) -> DMatrix<f64> {
    let k = matrix.nrows();
    matrix * (1.0 - lambda) + DMatrix::<f64>::identity(k, k) * lambda
}

/// Lower-triangular Cholesky factor.
pub fn cholesky(matrix: &DMatrix<f64>) -> MathResult<DMatrix<f64>> {
    if matrix.nrows() != matrix.ncols() {
        return Err(MathError::dimension_mismatch(matrix.nrows(), matrix.ncols()));
    }
    matrix
        .clone()
        .cholesky()
        .map(|c| c.l())
        .ok_or(MathError::NotPositiveDefinite)
}

/// Quadratic form `wᵀ M w`.
pub fn quadratic_form(weights: &[f64], matrix: &DMatrix<f64>) -> MathResult<f64> {
    if weights.len() != matrix.nrows() || matrix.nrows() != matrix.ncols() {
        return Err(MathError::dimension_mismatch(matrix.nrows(), weights.len()));
    }
    let w = DVector::from_column_slice(weights);
    Ok((w.transpose() * matrix * &w)[(0, 0)])
}
