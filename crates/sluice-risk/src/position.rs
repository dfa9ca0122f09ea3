//! Scored pool positions.

use serde::{Deserialize, Serialize};

use sluice_core::ids::ObligorId;
use sluice_core::types::{Obligor, Sector};

/// One obligor as seen by the risk calculator: exposure plus its current
/// default probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolPosition {
    /// Obligor identifier.
    pub id: ObligorId,
    /// Industry sector.
    pub sector: Sector,
    /// Exposure at default.
    pub exposure: f64,
    /// Default probability.
    pub pd: f64,
}

impl PoolPosition {
    /// Creates a position.
    #[must_use]
    pub fn new(id: impl Into<ObligorId>, sector: Sector, exposure: f64, pd: f64) -> Self {
        Self {
            id: id.into(),
            sector,
            exposure,
            pd,
        }
    }

    /// Builds a position from a stored obligor and its score.
    #[must_use]
    pub fn from_obligor(obligor: &Obligor, pd: f64) -> Self {
        Self {
            id: obligor.id.clone(),
            sector: obligor.features.sector,
            exposure: obligor.exposure_f64(),
            pd,
        }
    }

    /// `PD × (1 − recovery) × EAD`.
    #[must_use]
    pub fn expected_loss(&self, recovery: f64) -> f64 {
        self.pd * (1.0 - recovery) * self.exposure
    }
}

/// Sum of exposures.
pub fn total_exposure(positions: &[PoolPosition]) -> f64 {
    positions.iter().map(|p| p.exposure).sum()
}

/// Exposure-weighted default probability, 0 for an empty pool.
pub fn weighted_pd(positions: &[PoolPosition]) -> f64 {
    let total = total_exposure(positions);
    if total <= 0.0 {
        return 0.0;
    }
    positions.iter().map(|p| p.pd * p.exposure).sum::<f64>() / total
}
