//! Error taxonomy for the analytics engine.
//!
//! Every component reports failures through [`AnalyticsError`]. Only
//! [`AnalyticsError::Configuration`] is fatal; the other kinds are contained
//! to the affected obligor or metric and annotated on the published snapshot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A specialized Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Errors that can occur anywhere in the analytics pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Malformed or missing obligor/transaction fields.
    #[error("Data quality error for '{entity}': {reason}")]
    DataQuality {
        /// The offending entity (obligor id, transaction id, field path).
        entity: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A refresh deadline passed without new data.
    #[error("Stale data from {source_name}: age {age_secs:.1}s exceeds {threshold_secs:.1}s")]
    StaleData {
        /// The input that went stale.
        source_name: String,
        /// Age of the last good value in seconds.
        age_secs: f64,
        /// Configured staleness threshold in seconds.
        threshold_secs: f64,
    },

    /// Numeric instability or a failed estimator.
    #[error("Computation failed for {metric}: {reason}")]
    Computation {
        /// The metric being computed.
        metric: String,
        /// Description of the failure.
        reason: String,
    },

    /// Invalid structural configuration (fatal).
    #[error("Configuration error in {field}: {reason}")]
    Configuration {
        /// The configuration field or section.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Discriminant of [`AnalyticsError`], used to annotate degraded snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`AnalyticsError::DataQuality`].
    DataQuality,
    /// See [`AnalyticsError::StaleData`].
    StaleData,
    /// See [`AnalyticsError::Computation`].
    Computation,
    /// See [`AnalyticsError::Configuration`].
    Configuration,
}

impl AnalyticsError {
    /// Creates a data quality error.
    #[must_use]
    pub fn data_quality(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataQuality {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Creates a stale data error.
    #[must_use]
    pub fn stale(source_name: impl Into<String>, age_secs: f64, threshold_secs: f64) -> Self {
        Self::StaleData {
            source_name: source_name.into(),
            age_secs,
            threshold_secs,
        }
    }

    /// Creates a computation error.
    #[must_use]
    pub fn computation(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Computation {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataQuality { .. } => ErrorKind::DataQuality,
            Self::StaleData { .. } => ErrorKind::StaleData,
            Self::Computation { .. } => ErrorKind::Computation,
            Self::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Only structural configuration errors halt the engine.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// The entity or metric the error is attached to.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::DataQuality { entity, .. } => entity,
            Self::StaleData { source_name, .. } => source_name,
            Self::Computation { metric, .. } => metric,
            Self::Configuration { field, .. } => field,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DataQuality => "data_quality",
            Self::StaleData => "stale_data",
            Self::Computation => "computation",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyticsError::data_quality("OBL001", "negative exposure");
        assert!(err.to_string().contains("OBL001"));
        assert!(err.to_string().contains("negative exposure"));

        let err = AnalyticsError::stale("yield_rate", 120.0, 60.0);
        assert!(err.to_string().contains("yield_rate"));
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(AnalyticsError::configuration("tranches", "overlap").is_fatal());
        assert!(!AnalyticsError::computation("var", "empty").is_fatal());
        assert!(!AnalyticsError::data_quality("x", "y").is_fatal());
        assert!(!AnalyticsError::stale("x", 1.0, 0.5).is_fatal());
    }

    #[test]
    fn test_kind_and_subject() {
        let err = AnalyticsError::computation("correlation", "singular");
        assert_eq!(err.kind(), ErrorKind::Computation);
        assert_eq!(err.subject(), "correlation");
        assert_eq!(err.kind().to_string(), "computation");
    }
}
