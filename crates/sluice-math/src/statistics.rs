//! Descriptive statistics over `f64` samples.

use crate::error::{MathError, MathResult};

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> MathResult<f64> {
    if values.is_empty() {
        return Err(MathError::insufficient_data(1, 0));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased sample variance using the two-pass (mean-centred) formula.
pub fn sample_variance(values: &[f64]) -> MathResult<f64> {
    if values.len() < 2 {
        return Err(MathError::insufficient_data(2, values.len()));
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Ok(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> MathResult<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Pearson correlation of two equally long samples.
///
/// Returns [`MathError::DivisionByZero`] when either sample is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> MathResult<f64> {
    if x.len() != y.len() {
        return Err(MathError::dimension_mismatch(x.len(), y.len()));
    }
    if x.len() < 2 {
        return Err(MathError::insufficient_data(2, x.len()));
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom < 1e-300 {
        return Err(MathError::DivisionByZero { value: denom });
    }
    Ok((sxy / denom).clamp(-1.0, 1.0))
}

/// Linearly interpolated quantile of an ascending-sorted sample.
///
/// Uses the `h = (n − 1)·p` convention, so `p = 0` is the minimum and
/// `p = 1` the maximum.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> MathResult<f64> {
    if sorted.is_empty() {
        return Err(MathError::insufficient_data(1, 0));
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(MathError::invalid_input(format!(
            "quantile level must lie in [0, 1], got {p}"
        )));
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Ok(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Quantile of an unsorted sample.
pub fn quantile(values: &[f64], p: f64) -> MathResult<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, p)
}

/// Mean of the sorted values at or above the `p` quantile.
pub fn tail_mean_sorted(sorted: &[f64], p: f64) -> MathResult<f64> {
    let threshold = quantile_sorted(sorted, p)?;
    let tail: Vec<f64> = sorted.iter().copied().filter(|v| *v >= threshold).collect();
    if tail.is_empty() {
        Ok(threshold)
    } else {
        mean(&tail)
    }
}

/// Simple period returns `x_t / x_{t−1} − 1`.
pub fn simple_returns(series: &[f64]) -> MathResult<Vec<f64>> {
    series
        .windows(2)
        .map(|w| {
            if w[0].abs() < 1e-12 {
                Err(MathError::DivisionByZero { value: w[0] })
            } else {
                Ok(w[1] / w[0] - 1.0)
            }
        })
        .collect()
}

/// Pseudo-observations `rank / (n + 1)` with ties broken by position.
pub fn pseudo_observations(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut u = vec![0.0; n];
    for (rank, &idx) in order.iter().enumerate() {
        u[idx] = (rank + 1) as f64 / (n + 1) as f64;
    }
    u
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_variance() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&xs).unwrap(), 5.0);
        assert_relative_eq!(sample_variance(&xs).unwrap(), 32.0 / 7.0, epsilon = 1e-12);
        assert!(sample_variance(&[1.0]).is_err());
    }

    #[test]
    fn test_variance_large_offset() {
        // two-pass stays accurate far from zero
        let xs = [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0];
        assert_relative_eq!(sample_variance(&xs).unwrap(), 30.0, epsilon = 1e-6);
    }

    #[test]
    fn test_quantile_interpolation() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile_sorted(&xs, 0.0).unwrap(), 1.0);
        assert_relative_eq!(quantile_sorted(&xs, 0.5).unwrap(), 3.0);
        assert_relative_eq!(quantile_sorted(&xs, 0.9).unwrap(), 4.6, epsilon = 1e-12);
        assert_relative_eq!(quantile(&[5.0, 1.0, 3.0], 1.0).unwrap(), 5.0);
        assert!(quantile_sorted(&xs, 1.5).is_err());
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(pearson(&x, &[2.0, 4.0, 6.0, 8.0]).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&x, &[8.0, 6.0, 4.0, 2.0]).unwrap(), -1.0, epsilon = 1e-12);
        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_returns_and_ranks() {
        let r = simple_returns(&[100.0, 110.0, 99.0]).unwrap();
        assert_relative_eq!(r[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(r[1], -0.1, epsilon = 1e-12);
        assert!(simple_returns(&[0.0, 1.0]).is_err());

        let u = pseudo_observations(&[3.0, 1.0, 2.0]);
        assert_eq!(u, vec![0.75, 0.25, 0.5]);
    }
}
