//! Obligor correlation estimation.
//!
//! Exposure histories are placed on a common date grid and turned into
//! simple returns over the trailing window, then into a sample correlation matrix. When the estimate
//! is near-singular (smallest eigenvalue below the floor, or fewer
//! observations than obligors) it is shrunk toward the identity with the
//! minimal intensity that restores the floor.

use chrono::NaiveDate;
use nalgebra::DMatrix;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::ids::ObligorId;
use sluice_core::types::CorrelationMatrix;
use sluice_math::linear_algebra::{
    correlation_from_covariance, covariance_matrix, min_eigenvalue, shrink_to_identity,
    shrinkage_intensity,
};
use sluice_math::statistics::std_dev;
use sluice_store::StoreSnapshot;

use crate::config::CorrelationConfig;

/// Aligned per-obligor return series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPanel {
    obligors: Vec<ObligorId>,
    returns: Vec<Vec<f64>>,
}

impl ReturnPanel {
    /// Builds a panel from already-aligned return series.
    pub fn new(obligors: Vec<ObligorId>, returns: Vec<Vec<f64>>) -> AnalyticsResult<Self> {
        if obligors.len() != returns.len() {
            return Err(AnalyticsError::computation(
                "returns",
                format!("{} obligors but {} series", obligors.len(), returns.len()),
            ));
        }
        let m = returns.first().map_or(0, Vec::len);
        if returns.iter().any(|r| r.len() != m) {
            return Err(AnalyticsError::computation("returns", "series are not aligned"));
        }
        Ok(Self { obligors, returns })
    }

    /// Builds a panel from the exposure histories in a store snapshot.
    ///
    /// Histories are placed on the common grid of observation dates; see
    /// [`ReturnPanel::from_dated_levels`].
    pub fn from_snapshot(snapshot: &StoreSnapshot, window: usize) -> AnalyticsResult<Self> {
        let series: Vec<(ObligorId, Vec<(NaiveDate, f64)>)> = snapshot
            .obligors()
            .map(|o| {
                let levels = snapshot
                    .obligor_history(&o.id)
                    .iter()
                    .map(|r| (r.as_of.date_naive(), r.exposure_f64()))
                    .collect();
                (o.id.clone(), levels)
            })
            .collect();
        Self::from_dated_levels(series, window)
    }

    /// Builds a panel from dated level series (oldest first).
    ///
    /// The grid is the union of observation dates, trimmed to the last
    /// `window + 1`. On each grid date an obligor takes its latest level on
    /// or before that date; dates before its first observation take the
    /// first level, i.e. flat returns. Several observations on one date
    /// collapse to the last.
    pub fn from_dated_levels(
        series: Vec<(ObligorId, Vec<(NaiveDate, f64)>)>,
        window: usize,
    ) -> AnalyticsResult<Self> {
        let dates: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|(_, levels)| levels.iter().map(|(d, _)| *d))
            .collect();
        let points = dates.len().min(window + 1);
        if points < 3 {
            return Err(AnalyticsError::computation(
                "correlation",
                format!("need at least 2 aligned returns, have {}", points.saturating_sub(1)),
            ));
        }
        let grid: Vec<NaiveDate> = dates.into_iter().rev().take(points).rev().collect();

        let mut obligors = Vec::with_capacity(series.len());
        let mut returns = Vec::with_capacity(series.len());
        for (id, levels) in series {
            let Some(&(first_date, first)) = levels.first() else {
                continue;
            };
            if first_date > grid[0] {
                debug!(obligor = %id, since = %first_date, "short history padded");
            }
            let mut next = 0;
            let mut current = first;
            let aligned: Vec<f64> = grid
                .iter()
                .map(|day| {
                    while next < levels.len() && levels[next].0 <= *day {
                        current = levels[next].1;
                        next += 1;
                    }
                    current
                })
                .collect();
            returns.push(level_returns(&aligned));
            obligors.push(id);
        }
        Self::new(obligors, returns)
    }

    /// Obligors in panel order.
    #[must_use]
    pub fn obligors(&self) -> &[ObligorId] {
        &self.obligors
    }

    /// Return series in panel order.
    #[must_use]
    pub fn returns(&self) -> &[Vec<f64>] {
        &self.returns
    }

    /// Number of aligned returns.
    #[must_use]
    pub fn observations(&self) -> usize {
        self.returns.first().map_or(0, Vec::len)
    }

    /// Return series of one obligor.
    #[must_use]
    pub fn series(&self, id: &ObligorId) -> Option<&[f64]> {
        self.obligors
            .iter()
            .position(|o| o == id)
            .map(|i| self.returns[i].as_slice())
    }

    /// Per-obligor return volatility; zero for constant series.
    #[must_use]
    pub fn volatilities(&self) -> Vec<f64> {
        self.returns
            .iter()
            .map(|r| std_dev(r).unwrap_or(0.0))
            .collect()
    }

    /// The panel restricted and reordered to `ids`; unknown obligors get flat
    /// returns.
    #[must_use]
    pub fn aligned(&self, ids: &[ObligorId]) -> ReturnPanel {
        let m = self.observations();
        let returns = ids
            .iter()
            .map(|id| self.series(id).map_or_else(|| vec![0.0; m], <[f64]>::to_vec))
            .collect();
        ReturnPanel {
            obligors: ids.to_vec(),
            returns,
        }
    }

    /// Weighted portfolio returns `Σ wᵢ rᵢₜ`.
    pub fn portfolio_returns(&self, weights: &[f64]) -> AnalyticsResult<Vec<f64>> {
        if weights.len() != self.returns.len() {
            return Err(AnalyticsError::computation(
                "portfolio_returns",
                format!("{} weights for {} series", weights.len(), self.returns.len()),
            ));
        }
        Ok((0..self.observations())
            .map(|t| {
                self.returns
                    .iter()
                    .zip(weights)
                    .map(|(r, w)| r[t] * w)
                    .sum()
            })
            .collect())
    }
}

/// Simple returns, with zero return out of a zero level.
fn level_returns(levels: &[f64]) -> Vec<f64> {
    levels
        .windows(2)
        .map(|w| if w[0].abs() < 1e-12 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

/// Estimates the correlation matrix of a return panel.
pub fn estimate_correlation(
    panel: &ReturnPanel,
    config: &CorrelationConfig,
) -> AnalyticsResult<CorrelationMatrix> {
    let n = panel.obligors().len();
    let m = panel.observations();
    if m < 2 {
        return Err(AnalyticsError::computation(
            "correlation",
            format!("need at least 2 aligned observations, have {m}"),
        ));
    }
    if n == 0 {
        return Ok(CorrelationMatrix::identity(Vec::new()).with_observations(m));
    }

    let to_err = |e: sluice_math::MathError| AnalyticsError::computation("correlation", e.to_string());
    let cov = covariance_matrix(panel.returns()).map_err(to_err)?;
    let (corr, degenerate_idx) = correlation_from_covariance(&cov).map_err(to_err)?;

    let e_min = min_eigenvalue(&corr).map_err(to_err)?;
    let mut lambda = shrinkage_intensity(e_min, config.eigen_floor, config.min_shrinkage);
    if m < n {
        lambda = lambda.max(config.min_shrinkage);
    }
    let corr: DMatrix<f64> = if lambda > 0.0 {
        warn!(e_min, lambda, observations = m, obligors = n, "correlation regularized");
        shrink_to_identity(&corr, lambda)
    } else {
        corr
    };

    let values: Vec<f64> = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| corr[(i, j)])
        .collect();
    let degenerate: Vec<ObligorId> = degenerate_idx
        .into_iter()
        .map(|i| panel.obligors()[i].clone())
        .collect();
    if !degenerate.is_empty() {
        debug!(count = degenerate.len(), "zero-variance return series");
    }

    let mut matrix = CorrelationMatrix::from_row_major(panel.obligors().to_vec(), values)?
        .with_observations(m)
        .with_degenerate(degenerate);
    if lambda > 0.0 {
        matrix = matrix.with_regularization(lambda);
    }
    Ok(matrix)
}

/// The matrix restricted and reordered to `ids`.
///
/// Obligors missing from `matrix` are uncorrelated with everything else.
pub fn align_correlation(
    matrix: &CorrelationMatrix,
    ids: &[ObligorId],
) -> AnalyticsResult<CorrelationMatrix> {
    if matrix.obligors() == ids {
        return Ok(matrix.clone());
    }
    let index: Vec<Option<usize>> = ids.iter().map(|id| matrix.index_of(id)).collect();
    let n = ids.len();
    let mut values = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            values[i * n + j] = match (index[i], index[j]) {
                _ if i == j => 1.0,
                (Some(a), Some(b)) => matrix.get(a, b),
                _ => 0.0,
            };
        }
    }
    let degenerate = matrix
        .degenerate
        .iter()
        .filter(|id| ids.contains(id))
        .cloned()
        .collect();
    let mut aligned = CorrelationMatrix::from_row_major(ids.to_vec(), values)?
        .with_observations(matrix.observations)
        .with_degenerate(degenerate);
    if matrix.regularized {
        aligned = aligned.with_regularization(matrix.shrinkage);
    }
    Ok(aligned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ids(n: usize) -> Vec<ObligorId> {
        (0..n).map(|i| ObligorId::new(format!("OBL{i}"))).collect()
    }

    #[test]
    fn test_perfectly_correlated_series_are_regularized() {
        let a = vec![0.01, -0.02, 0.03, 0.00, 0.01];
        let b: Vec<f64> = a.iter().map(|x| x * 2.0).collect();
        let panel = ReturnPanel::new(ids(2), vec![a, b]).unwrap();
        let corr = estimate_correlation(&panel, &CorrelationConfig::default()).unwrap();
        assert!(corr.regularized);
        assert!(corr.get(0, 1) < 1.0);
        assert!(corr.get(0, 1) > 0.99);
        assert_eq!(corr.get(0, 0), 1.0);
        assert_eq!(corr.observations, 5);
    }

    #[test]
    fn test_zero_variance_series_annotated() {
        let panel = ReturnPanel::new(
            ids(3),
            vec![
                vec![0.01, -0.02, 0.03, 0.00],
                vec![0.0; 4],
                vec![-0.01, 0.02, 0.01, 0.00],
            ],
        )
        .unwrap();
        let corr = estimate_correlation(&panel, &CorrelationConfig::default()).unwrap();
        assert_eq!(corr.degenerate, vec![ObligorId::new("OBL1")]);
        assert_eq!(corr.get(0, 1), 0.0);
        assert_eq!(corr.get(1, 1), 1.0);
    }

    #[test]
    fn test_insufficient_observations() {
        let panel = ReturnPanel::new(ids(2), vec![vec![0.01], vec![0.02]]).unwrap();
        let err = estimate_correlation(&panel, &CorrelationConfig::default()).unwrap_err();
        assert!(!err.is_fatal());

        let levels = vec![(ObligorId::new("A"), dated(&[100.0, 101.0]))];
        assert!(ReturnPanel::from_dated_levels(levels, 30).is_err());
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Days::new(u64::from(n))
    }

    fn dated(levels: &[f64]) -> Vec<(NaiveDate, f64)> {
        levels
            .iter()
            .enumerate()
            .map(|(i, l)| (day(i as u32), *l))
            .collect()
    }

    #[test]
    fn test_from_dated_levels_pads_and_windows() {
        let levels = vec![
            (ObligorId::new("A"), dated(&[100.0, 110.0, 99.0, 99.0])),
            (ObligorId::new("B"), vec![(day(3), 50.0)]),
        ];
        let panel = ReturnPanel::from_dated_levels(levels, 2).unwrap();
        assert_eq!(panel.observations(), 2);
        let a = panel.series(&ObligorId::new("A")).unwrap();
        assert_relative_eq!(a[0], -0.1, epsilon = 1e-12);
        assert_relative_eq!(a[1], 0.0, epsilon = 1e-12);
        let b = panel.series(&ObligorId::new("B")).unwrap();
        assert_eq!(b, &[0.0, 0.0][..]);
    }

    #[test]
    fn test_histories_of_different_length_align_by_date() {
        let shared = [100.0, 110.0, 100.0, 110.0, 100.0];
        let mut longer = dated(&shared);
        longer.push((day(5), 100.0));
        let levels = vec![
            (ObligorId::new("A"), longer),
            (ObligorId::new("B"), dated(&shared)),
        ];
        let panel = ReturnPanel::from_dated_levels(levels, 30).unwrap();
        assert_eq!(panel.observations(), 5);
        assert_eq!(
            panel.series(&ObligorId::new("A")),
            panel.series(&ObligorId::new("B"))
        );

        let corr = estimate_correlation(&panel, &CorrelationConfig::default()).unwrap();
        assert!(corr.get(0, 1) > 0.5, "rho = {}", corr.get(0, 1));
    }

    #[test]
    fn test_gaps_carry_last_level_forward() {
        let levels = vec![
            (ObligorId::new("A"), dated(&[100.0, 120.0, 90.0, 90.0])),
            (
                ObligorId::new("B"),
                vec![(day(0), 10.0), (day(2), 12.0), (day(2), 11.0)],
            ),
        ];
        let panel = ReturnPanel::from_dated_levels(levels, 30).unwrap();
        let b = panel.series(&ObligorId::new("B")).unwrap();
        // day 1 repeats day 0, day 2 keeps the last record of the day
        assert_relative_eq!(b[0], 0.0);
        assert_relative_eq!(b[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(b[2], 0.0);
    }

    #[test]
    fn test_alignment() {
        let ids3 = ids(3);
        let corr = CorrelationMatrix::from_row_major(
            ids3.clone(),
            vec![1.0, 0.3, 0.1, 0.3, 1.0, 0.2, 0.1, 0.2, 1.0],
        )
        .unwrap();
        let wanted = vec![ids3[2].clone(), ids3[0].clone(), ObligorId::new("NEW")];
        let aligned = align_correlation(&corr, &wanted).unwrap();
        assert_relative_eq!(aligned.get(0, 1), 0.1);
        assert_eq!(aligned.get(0, 2), 0.0);
        assert_eq!(aligned.get(2, 2), 1.0);

        let panel = ReturnPanel::new(ids(1), vec![vec![0.1, 0.2]]).unwrap();
        let aligned = panel.aligned(&[ObligorId::new("X"), ObligorId::new("OBL0")]);
        assert_eq!(aligned.returns()[0], vec![0.0, 0.0]);
        assert_eq!(aligned.returns()[1], vec![0.1, 0.2]);
    }

    #[test]
    fn test_portfolio_returns() {
        let panel = ReturnPanel::new(ids(2), vec![vec![0.1, -0.1], vec![0.0, 0.2]]).unwrap();
        let r = panel.portfolio_returns(&[0.5, 0.5]).unwrap();
        assert_relative_eq!(r[0], 0.05);
        assert_relative_eq!(r[1], 0.05);
        assert!(panel.portfolio_returns(&[1.0]).is_err());
    }
}
