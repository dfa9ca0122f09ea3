//! Query error types.

use thiserror::Error;

use sluice_core::error::AnalyticsError;
use sluice_core::ids::{ScenarioId, TrancheId};

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors returned by [`QueryHandle`](crate::QueryHandle).
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// No snapshot has published the requested value yet.
    #[error("not ready: {what} has not been published")]
    NotReady {
        /// What was requested.
        what: String,
    },

    /// The tranche is not part of the configured stack.
    #[error("unknown tranche: {0}")]
    UnknownTranche(TrancheId),

    /// No scenario with this id is configured.
    #[error("unknown scenario: {0}")]
    UnknownScenario(ScenarioId),

    /// The underlying computation failed.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

impl QueryError {
    /// Creates a not-ready error.
    #[must_use]
    pub fn not_ready(what: impl Into<String>) -> Self {
        Self::NotReady { what: what.into() }
    }

    /// True when retrying after the next publication may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}

impl From<QueryError> for AnalyticsError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Analytics(e) => e,
            QueryError::NotReady { what } => {
                AnalyticsError::stale(what, f64::INFINITY, 0.0)
            }
            QueryError::UnknownTranche(id) => {
                AnalyticsError::configuration(format!("tranches.{id}"), "unknown tranche")
            }
            QueryError::UnknownScenario(id) => {
                AnalyticsError::configuration(format!("scenarios.{id}"), "unknown scenario")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::error::ErrorKind;

    #[test]
    fn test_conversion() {
        let err: AnalyticsError = QueryError::UnknownScenario("bogus".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.subject(), "scenarios.bogus");

        let err: AnalyticsError = QueryError::not_ready("risk report").into();
        assert_eq!(err.kind(), ErrorKind::StaleData);
        assert!(QueryError::not_ready("price").is_transient());
    }
}
