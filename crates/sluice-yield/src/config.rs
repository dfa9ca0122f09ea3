//! Yield engine configuration.

use serde::{Deserialize, Serialize};

use sluice_core::validation::{Validate, ValidationError};

/// How a period return is annualized.
///
/// ```rust
/// use sluice_yield::ApyConvention;
///
/// // 1% over a fifth of a year
/// let simple = ApyConvention::Simple.annualize(0.01, 0.2);
/// assert!((simple - 0.05).abs() < 1e-12);
///
/// let compound = ApyConvention::Compound.annualize(0.01, 0.2);
/// assert!(compound > simple);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApyConvention {
    /// `(1 + r)^(1/t) − 1`
    #[default]
    Compound,
    /// `r / t`
    Simple,
}

impl ApyConvention {
    /// Annualizes a return earned over `year_fraction` years.
    ///
    /// Returns 0 for an empty period; a total loss annualizes to −1.
    #[must_use]
    pub fn annualize(&self, period_return: f64, year_fraction: f64) -> f64 {
        if !(year_fraction > 0.0) || !period_return.is_finite() {
            return 0.0;
        }
        match self {
            Self::Simple => period_return / year_fraction,
            Self::Compound => {
                if period_return <= -1.0 {
                    -1.0
                } else {
                    (1.0 + period_return).powf(1.0 / year_fraction) - 1.0
                }
            }
        }
    }
}

/// Yield engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldConfig {
    /// APY annualization convention.
    #[serde(default)]
    pub apy_convention: ApyConvention,

    /// Day-count denominator for coupon accrual (Act/365 by default).
    #[serde(default = "default_days_in_year")]
    pub days_in_year: u32,

    /// Decimal places entitlements are rounded to.
    #[serde(default = "default_cash_scale")]
    pub cash_scale: u32,

    /// Trailing days of realized cash the yield forecast is fitted on.
    #[serde(default = "default_forecast_lookback_days")]
    pub forecast_lookback_days: u32,
}

fn default_days_in_year() -> u32 {
    365
}

fn default_cash_scale() -> u32 {
    2
}

fn default_forecast_lookback_days() -> u32 {
    30
}

impl Default for YieldConfig {
    fn default() -> Self {
        Self {
            apy_convention: ApyConvention::default(),
            days_in_year: default_days_in_year(),
            cash_scale: default_cash_scale(),
            forecast_lookback_days: default_forecast_lookback_days(),
        }
    }
}

impl YieldConfig {
    /// Sets the APY convention.
    #[must_use]
    pub fn with_apy_convention(mut self, convention: ApyConvention) -> Self {
        self.apy_convention = convention;
        self
    }

    /// Sets the day-count denominator.
    #[must_use]
    pub fn with_days_in_year(mut self, days: u32) -> Self {
        self.days_in_year = days;
        self
    }

    /// Sets the forecast lookback.
    #[must_use]
    pub fn with_forecast_lookback_days(mut self, days: u32) -> Self {
        self.forecast_lookback_days = days;
        self
    }
}

impl Validate for YieldConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if !(360..=366).contains(&self.days_in_year) {
            errors.push(ValidationError::new(
                "days_in_year",
                format!("must be 360, 365 or 366, got {}", self.days_in_year),
            ));
        }
        if self.cash_scale > 12 {
            errors.push(ValidationError::new(
                "cash_scale",
                format!("at most 12 decimal places, got {}", self.cash_scale),
            ));
        }
        if self.forecast_lookback_days < 2 {
            errors.push(ValidationError::new(
                "forecast_lookback_days",
                format!("at least 2 days needed for a trend, got {}", self.forecast_lookback_days),
            ));
        }
        errors
    }
}
