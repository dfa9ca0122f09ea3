//! Pool transactions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::ids::{ObligorId, TransactionId};

/// Cash direction relative to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Cash received by the pool.
    Inflow,
    /// Cash paid out or written off by the pool.
    Outflow,
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Submitted, not yet settled.
    Pending,
    /// Settled.
    Settled,
    /// Failed to settle.
    Failed,
    /// The obligor defaulted on this flow.
    Defaulted,
}

/// What the cash represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowKind {
    /// Principal drawdown or repayment.
    #[default]
    Principal,
    /// Interest payment.
    Interest,
    /// Fee income.
    Fee,
    /// Recovery on a defaulted exposure.
    Recovery,
}

impl CashFlowKind {
    /// Whether this flow counts toward distributable cash.
    #[must_use]
    pub fn is_distributable(&self) -> bool {
        matches!(self, Self::Interest | Self::Fee | Self::Recovery)
    }
}

/// An immutable pool transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    /// Transaction identifier.
    pub id: TransactionId,
    /// Referenced obligor.
    pub obligor_id: ObligorId,
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Amount, always positive; the sign lives in `direction`.
    pub amount: Decimal,
    /// Inflow or outflow.
    pub direction: Direction,
    /// Settlement status.
    pub status: TransactionStatus,
    /// Cash flow kind.
    #[serde(default)]
    pub kind: CashFlowKind,
}

impl Transaction {
    /// Creates a settled transaction.
    #[must_use]
    pub fn settled(
        id: impl Into<TransactionId>,
        obligor_id: impl Into<ObligorId>,
        timestamp: DateTime<Utc>,
        amount: Decimal,
        direction: Direction,
        kind: CashFlowKind,
    ) -> Self {
        Self {
            id: id.into(),
            obligor_id: obligor_id.into(),
            timestamp,
            amount,
            direction,
            status: TransactionStatus::Settled,
            kind,
        }
    }

    /// Returns a copy with a different status.
    #[must_use]
    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Field-level validation. Ordering and obligor existence are checked by the store.
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(AnalyticsError::data_quality("transaction.id", "empty id"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(AnalyticsError::data_quality(
                self.id.as_str(),
                format!("amount must be positive, got {}", self.amount),
            ));
        }
        Ok(())
    }

    /// Amount signed by direction (inflows positive).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Inflow => self.amount,
            Direction::Outflow => -self.amount,
        }
    }

    /// True once the cash has actually moved.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status == TransactionStatus::Settled
    }
}
