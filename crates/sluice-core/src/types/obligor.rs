//! Obligor records and feature vectors.
//!
//! Obligor attributes arrive as [`ObligorRecord`]s: fixed-shape, schema
//! versioned, and strict about unknown or missing fields. A record that
//! passes [`ObligorRecord::validate`] becomes an [`Obligor`] in the store.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::ids::ObligorId;

/// Current obligor ingestion schema version.
pub const OBLIGOR_SCHEMA_VERSION: u32 = 1;

/// Industry sector of an obligor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    /// Agriculture and farming.
    Agriculture,
    /// Automotive manufacturing and suppliers.
    Automotive,
    /// Beverages.
    Beverages,
    /// Construction.
    Construction,
    /// Consumer goods.
    ConsumerGoods,
    /// Education.
    Education,
    /// Energy and utilities.
    Energy,
    /// Financial services.
    Financial,
    /// Healthcare.
    Healthcare,
    /// Logistics and transport.
    Logistics,
    /// General manufacturing.
    Manufacturing,
    /// Mining and resources.
    Mining,
    /// Real estate.
    RealEstate,
    /// Retail.
    Retail,
    /// Technology.
    Technology,
    /// Telecommunications.
    Telecommunications,
}

impl Sector {
    /// All sectors.
    pub const ALL: [Sector; 16] = [
        Sector::Agriculture,
        Sector::Automotive,
        Sector::Beverages,
        Sector::Construction,
        Sector::ConsumerGoods,
        Sector::Education,
        Sector::Energy,
        Sector::Financial,
        Sector::Healthcare,
        Sector::Logistics,
        Sector::Manufacturing,
        Sector::Mining,
        Sector::RealEstate,
        Sector::Retail,
        Sector::Technology,
        Sector::Telecommunications,
    ];

    /// Relative sector risk multiplier (1.0 = neutral).
    #[must_use]
    pub fn risk_multiplier(&self) -> f64 {
        match self {
            Self::Agriculture => 1.3,
            Self::Automotive => 1.2,
            Self::Beverages => 0.9,
            Self::Construction => 1.3,
            Self::ConsumerGoods => 1.0,
            Self::Education => 0.9,
            Self::Energy => 1.4,
            Self::Financial => 0.9,
            Self::Healthcare => 0.8,
            Self::Logistics => 1.1,
            Self::Manufacturing => 1.1,
            Self::Mining => 1.2,
            Self::RealEstate => 1.5,
            Self::Retail => 1.0,
            Self::Technology => 1.1,
            Self::Telecommunications => 0.8,
        }
    }

    /// Snake-case sector name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Agriculture => "agriculture",
            Self::Automotive => "automotive",
            Self::Beverages => "beverages",
            Self::Construction => "construction",
            Self::ConsumerGoods => "consumer_goods",
            Self::Education => "education",
            Self::Energy => "energy",
            Self::Financial => "financial",
            Self::Healthcare => "healthcare",
            Self::Logistics => "logistics",
            Self::Manufacturing => "manufacturing",
            Self::Mining => "mining",
            Self::RealEstate => "real_estate",
            Self::Retail => "retail",
            Self::Technology => "technology",
            Self::Telecommunications => "telecommunications",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric model input derived from a [`FeatureVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Debt-to-equity style leverage ratio. Risk increasing.
    Leverage,
    /// Fraction of obligations paid on time, in `[0, 1]`. Risk decreasing.
    PaymentHistory,
    /// The sector's risk multiplier.
    SectorRisk,
    /// Size of the obligor's business (log scale).
    ExposureSize,
}

impl Feature {
    /// All model features.
    pub const ALL: [Feature; 4] = [
        Feature::Leverage,
        Feature::PaymentHistory,
        Feature::SectorRisk,
        Feature::ExposureSize,
    ];
}

/// Fixed-shape obligor feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureVector {
    /// Leverage ratio (>= 0).
    pub leverage: f64,
    /// On-time payment fraction in `[0, 1]`.
    pub payment_history: f64,
    /// Industry sector.
    pub sector: Sector,
    /// Business size indicator (>= 0, log scale).
    pub exposure_size: f64,
}

impl FeatureVector {
    /// Creates a feature vector.
    #[must_use]
    pub fn new(leverage: f64, payment_history: f64, sector: Sector, exposure_size: f64) -> Self {
        Self {
            leverage,
            payment_history,
            sector,
            exposure_size,
        }
    }

    /// Returns a copy with a different leverage.
    #[must_use]
    pub fn with_leverage(mut self, leverage: f64) -> Self {
        self.leverage = leverage;
        self
    }

    /// Returns a copy with a different payment history.
    #[must_use]
    pub fn with_payment_history(mut self, payment_history: f64) -> Self {
        self.payment_history = payment_history;
        self
    }

    /// Numeric value of a model feature.
    #[must_use]
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Leverage => self.leverage,
            Feature::PaymentHistory => self.payment_history,
            Feature::SectorRisk => self.sector.risk_multiplier(),
            Feature::ExposureSize => self.exposure_size,
        }
    }

    /// Checks ranges and finiteness.
    pub fn validate(&self, entity: &str) -> AnalyticsResult<()> {
        if !self.leverage.is_finite() || self.leverage < 0.0 {
            return Err(AnalyticsError::data_quality(
                format!("{entity}.features.leverage"),
                format!("must be finite and non-negative, got {}", self.leverage),
            ));
        }
        if !self.payment_history.is_finite() || !(0.0..=1.0).contains(&self.payment_history) {
            return Err(AnalyticsError::data_quality(
                format!("{entity}.features.payment_history"),
                format!("must lie in [0, 1], got {}", self.payment_history),
            ));
        }
        if !self.exposure_size.is_finite() || self.exposure_size < 0.0 {
            return Err(AnalyticsError::data_quality(
                format!("{entity}.features.exposure_size"),
                format!("must be finite and non-negative, got {}", self.exposure_size),
            ));
        }
        Ok(())
    }
}

/// Obligor record as delivered by a data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObligorRecord {
    /// Schema version of this record.
    pub schema_version: u32,
    /// Obligor identifier.
    pub id: ObligorId,
    /// Model features.
    pub features: FeatureVector,
    /// Exposure of the pool to this obligor.
    pub exposure: Decimal,
    /// Observation timestamp.
    pub as_of: DateTime<Utc>,
}

impl ObligorRecord {
    /// Creates a record at the current schema version.
    #[must_use]
    pub fn new(
        id: impl Into<ObligorId>,
        features: FeatureVector,
        exposure: Decimal,
        as_of: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: OBLIGOR_SCHEMA_VERSION,
            id: id.into(),
            features,
            exposure,
            as_of,
        }
    }

    /// Parses a JSON record, mapping schema violations to data quality errors.
    pub fn from_json(json: &str) -> AnalyticsResult<Self> {
        let record: Self = serde_json::from_str(json)
            .map_err(|e| AnalyticsError::data_quality("obligor_record", e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    /// Validates the record at the ingestion boundary.
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.schema_version != OBLIGOR_SCHEMA_VERSION {
            return Err(AnalyticsError::data_quality(
                self.id.as_str(),
                format!(
                    "unsupported schema version {} (expected {})",
                    self.schema_version, OBLIGOR_SCHEMA_VERSION
                ),
            ));
        }
        if self.id.as_str().trim().is_empty() {
            return Err(AnalyticsError::data_quality("obligor_record.id", "empty id"));
        }
        if self.exposure.is_sign_negative() {
            return Err(AnalyticsError::data_quality(
                format!("{}.exposure", self.id),
                format!("must be non-negative, got {}", self.exposure),
            ));
        }
        self.features.validate(self.id.as_str())
    }
}

/// A validated, versioned obligor observation held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligor {
    /// Obligor identifier.
    pub id: ObligorId,
    /// Model features.
    pub features: FeatureVector,
    /// Exposure amount.
    pub exposure: Decimal,
    /// Observation timestamp.
    pub as_of: DateTime<Utc>,
    /// Record version, 1 for the first observation of this obligor.
    pub version: u64,
}

impl Obligor {
    /// Builds an obligor from a validated record.
    #[must_use]
    pub fn from_record(record: ObligorRecord, version: u64) -> Self {
        Self {
            id: record.id,
            features: record.features,
            exposure: record.exposure,
            as_of: record.as_of,
            version,
        }
    }

    /// Exposure as a float for statistical work.
    #[must_use]
    pub fn exposure_f64(&self) -> f64 {
        self.exposure.to_f64().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn features() -> FeatureVector {
        FeatureVector::new(1.5, 0.95, Sector::Automotive, 6.0)
    }

    #[test]
    fn test_record_validation() {
        let record = ObligorRecord::new("OBL001", features(), dec!(500000), Utc::now());
        assert!(record.validate().is_ok());

        let mut bad = record.clone();
        bad.exposure = dec!(-1);
        assert!(bad.validate().is_err());

        let mut bad = record.clone();
        bad.schema_version = 99;
        assert!(bad.validate().is_err());

        let mut bad = record;
        bad.features.payment_history = 1.2;
        let err = bad.validate().unwrap_err();
        assert!(err.subject().contains("payment_history"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{
            "schema_version": 1,
            "id": "OBL001",
            "features": {"leverage": 1.0, "payment_history": 0.9, "sector": "retail", "exposure_size": 5.0},
            "exposure": "1000",
            "as_of": "2025-01-15T00:00:00Z",
            "credit_rating": "BBB"
        }"#;
        assert!(ObligorRecord::from_json(json).is_err());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let json = r#"{
            "schema_version": 1,
            "id": "OBL001",
            "features": {"leverage": 1.0, "sector": "retail", "exposure_size": 5.0},
            "exposure": "1000",
            "as_of": "2025-01-15T00:00:00Z"
        }"#;
        assert!(ObligorRecord::from_json(json).is_err());
    }

    #[test]
    fn test_feature_values() {
        let f = features();
        assert_eq!(f.value(Feature::Leverage), 1.5);
        assert_eq!(f.value(Feature::SectorRisk), 1.2);
        assert_eq!(f.with_leverage(3.0).leverage, 3.0);
    }
}
