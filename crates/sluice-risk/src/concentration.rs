//! Exposure concentration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use sluice_core::error::{AnalyticsError, AnalyticsResult};
use sluice_core::ids::ObligorId;
use sluice_core::types::Sector;

use crate::position::PoolPosition;

/// HHI above which the pool is highly concentrated.
pub const HIGH_CONCENTRATION: f64 = 0.25;

/// HHI above which the pool is moderately concentrated.
pub const MEDIUM_CONCENTRATION: f64 = 0.15;

/// Concentration classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationLevel {
    /// HHI at or below 0.15.
    Low,
    /// HHI in (0.15, 0.25].
    Medium,
    /// HHI above 0.25.
    High,
}

impl ConcentrationLevel {
    /// Classifies an HHI value.
    #[must_use]
    pub fn from_hhi(hhi: f64) -> Self {
        if hhi > HIGH_CONCENTRATION {
            Self::High
        } else if hhi > MEDIUM_CONCENTRATION {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for ConcentrationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Concentration metrics for the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationReport {
    /// Herfindahl-Hirschman index `Σ sᵢ²`, in `[1/N, 1]`.
    pub hhi: f64,
    /// `(H − 1/N) / (1 − 1/N)`; 0 for a single obligor.
    pub normalized_hhi: f64,
    /// Effective number of obligors, `1/H`.
    pub effective_count: f64,
    /// Combined share of the five largest exposures.
    pub top5_share: f64,
    /// Largest single exposure.
    pub largest: Option<(ObligorId, f64)>,
    /// Exposure share per sector.
    pub sector_shares: BTreeMap<Sector, f64>,
    /// Classification of `hhi`.
    pub level: ConcentrationLevel,
}

/// Computes concentration metrics.
///
/// Zero-exposure obligors count toward `N` but contribute nothing to `H`.
pub fn concentration(positions: &[PoolPosition]) -> AnalyticsResult<ConcentrationReport> {
    if positions.iter().any(|p| !p.exposure.is_finite() || p.exposure < 0.0) {
        return Err(AnalyticsError::computation(
            "concentration",
            "exposures must be finite and non-negative",
        ));
    }
    let total: f64 = positions.iter().map(|p| p.exposure).sum();
    if total <= 0.0 {
        return Err(AnalyticsError::computation(
            "concentration",
            "pool has no exposure",
        ));
    }

    let mut shares: Vec<f64> = positions.iter().map(|p| p.exposure / total).collect();
    let hhi: f64 = shares.iter().map(|s| s * s).sum();
    let n = positions.len() as f64;
    let normalized_hhi = if positions.len() > 1 {
        ((hhi - 1.0 / n) / (1.0 - 1.0 / n)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    shares.sort_by(|a, b| b.total_cmp(a));
    let top5_share = shares.iter().take(5).sum();

    let largest = positions
        .iter()
        .max_by(|a, b| a.exposure.total_cmp(&b.exposure))
        .map(|p| (p.id.clone(), p.exposure));

    let mut sector_shares = BTreeMap::new();
    for p in positions {
        *sector_shares.entry(p.sector).or_insert(0.0) += p.exposure / total;
    }

    Ok(ConcentrationReport {
        hhi,
        normalized_hhi,
        effective_count: 1.0 / hhi,
        top5_share,
        largest,
        sector_shares,
        level: ConcentrationLevel::from_hhi(hhi),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pos(id: &str, sector: Sector, exposure: f64) -> PoolPosition {
        PoolPosition::new(id, sector, exposure, 0.02)
    }

    #[test]
    fn test_three_obligors() {
        let positions = vec![
            pos("A", Sector::Retail, 500.0),
            pos("B", Sector::Retail, 300.0),
            pos("C", Sector::Energy, 200.0),
        ];
        let report = concentration(&positions).unwrap();
        assert_relative_eq!(report.hhi, 0.38, epsilon = 1e-12);
        assert_eq!(report.level, ConcentrationLevel::High);
        assert_relative_eq!(report.top5_share, 1.0, epsilon = 1e-12);
        assert_relative_eq!(report.sector_shares[&Sector::Retail], 0.8, epsilon = 1e-12);
        assert_eq!(report.largest.unwrap().0, ObligorId::new("A"));
        // (0.38 - 1/3) / (2/3)
        assert_relative_eq!(report.normalized_hhi, 0.07, epsilon = 1e-12);
    }

    #[test]
    fn test_equal_exposures() {
        let positions: Vec<_> = ["A", "B", "C", "D"]
            .iter()
            .map(|id| pos(id, Sector::Technology, 250.0))
            .collect();
        let report = concentration(&positions).unwrap();
        assert_relative_eq!(report.hhi, 0.25, epsilon = 1e-12);
        assert_relative_eq!(report.effective_count, 4.0, epsilon = 1e-9);
        assert_relative_eq!(report.normalized_hhi, 0.0, epsilon = 1e-12);
        assert_eq!(report.level, ConcentrationLevel::Medium);
    }

    #[test]
    fn test_levels() {
        assert_eq!(ConcentrationLevel::from_hhi(0.1), ConcentrationLevel::Low);
        assert_eq!(ConcentrationLevel::from_hhi(0.15), ConcentrationLevel::Low);
        assert_eq!(ConcentrationLevel::from_hhi(0.2), ConcentrationLevel::Medium);
    }

    #[test]
    fn test_empty_pool() {
        assert!(concentration(&[]).is_err());
        assert!(concentration(&[pos("A", Sector::Retail, 0.0)]).is_err());
    }
}
