//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use sluice_core::error::{AnalyticsError, ErrorKind};
use sluice_engine::QueryError;

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A query failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A worker task failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Query(QueryError::NotReady { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Query(QueryError::UnknownTranche(_) | QueryError::UnknownScenario(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Query(QueryError::Analytics(e)) => match e.kind() {
                ErrorKind::StaleData => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::DataQuality | ErrorKind::Computation => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Query(QueryError::NotReady { .. }) => "not_ready",
            Self::Query(QueryError::UnknownTranche(_)) => "unknown_tranche",
            Self::Query(QueryError::UnknownScenario(_)) => "unknown_scenario",
            Self::Query(QueryError::Analytics(e)) => match e.kind() {
                ErrorKind::DataQuality => "data_quality",
                ErrorKind::StaleData => "stale_data",
                ErrorKind::Computation => "computation",
                ErrorKind::Configuration => "configuration",
            },
            Self::Internal(_) => "internal",
        }
    }
}

impl From<AnalyticsError> for ServerError {
    fn from(err: AnalyticsError) -> Self {
        Self::Query(QueryError::Analytics(err))
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
    kind: &'static str,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}
