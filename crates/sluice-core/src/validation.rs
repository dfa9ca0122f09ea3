//! Configuration validation.

use std::fmt;

use crate::error::AnalyticsError;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Field that failed validation.
    pub field: String,
    /// Validation error message.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Prefixes the field with a section name.
    #[must_use]
    pub fn in_section(mut self, section: &str) -> Self {
        self.field = format!("{section}.{}", self.field);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl From<ValidationError> for AnalyticsError {
    fn from(err: ValidationError) -> Self {
        AnalyticsError::configuration(err.field, err.message)
    }
}

/// Trait for validatable configurations.
pub trait Validate {
    /// Returns every validation failure, or an empty vector if valid.
    fn validate(&self) -> Vec<ValidationError>;

    /// Returns true if the configuration is valid.
    fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Fails with the first validation error as a configuration error.
    fn ensure_valid(&self) -> Result<(), AnalyticsError> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
