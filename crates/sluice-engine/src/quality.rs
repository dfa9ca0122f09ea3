//! Data-quality scoring of fetched batches.
//!
//! Each batch starts at 1.0 and loses a configured penalty per defect:
//! an empty batch, a record that fails field validation, or a transaction
//! that names an obligor the store has never seen. The cycle's quality is
//! the lowest of the batch scores and the provider's own signal.

use serde::{Deserialize, Serialize};
use std::fmt;

use sluice_config::DataQualityConfig;
use sluice_core::types::{ObligorRecord, Transaction};
use sluice_store::StoreSnapshot;

/// Coarse quality band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    /// Score of at least 0.9.
    High,
    /// Score of at least 0.7.
    Medium,
    /// Anything lower.
    Low,
}

impl QualityLevel {
    /// Band of `score`.
    #[must_use]
    pub fn of(score: f64) -> Self {
        if score >= 0.9 {
            Self::High
        } else if score >= 0.7 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

/// Score and findings for one fetched batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// One line per defect class found.
    pub issues: Vec<String>,
}

impl Default for QualityAssessment {
    fn default() -> Self {
        Self {
            score: 1.0,
            issues: Vec::new(),
        }
    }
}

impl QualityAssessment {
    /// Scores a batch of obligor records.
    pub fn of_obligors(records: &[ObligorRecord], config: &DataQualityConfig) -> Self {
        let mut assessment = Self::default();
        if records.is_empty() {
            assessment.penalize(config.empty_batch_penalty, "empty obligor batch".to_string());
            return assessment;
        }
        let invalid = records.iter().filter(|r| r.validate().is_err()).count();
        assessment.penalize_each(config.invalid_record_penalty, invalid, "invalid obligor records");
        assessment
    }

    /// Scores a batch of transactions against the obligors already stored.
    ///
    /// An empty batch is only a defect on the initial load; incremental
    /// fetches are often empty.
    pub fn of_transactions(
        transactions: &[Transaction],
        store: &StoreSnapshot,
        initial: bool,
        config: &DataQualityConfig,
    ) -> Self {
        let mut assessment = Self::default();
        if transactions.is_empty() {
            if initial {
                assessment
                    .penalize(config.empty_batch_penalty, "no transactions found".to_string());
            }
            return assessment;
        }
        let mut invalid = 0;
        let mut unknown = 0;
        for tx in transactions {
            if tx.validate().is_err() {
                invalid += 1;
            } else if store.obligor(&tx.obligor_id).is_none() {
                unknown += 1;
            }
        }
        assessment.penalize_each(config.invalid_record_penalty, invalid, "invalid transactions");
        assessment.penalize_each(
            config.unknown_obligor_penalty,
            unknown,
            "transactions for unknown obligors",
        );
        assessment
    }

    /// Quality band of the score.
    #[must_use]
    pub fn level(&self) -> QualityLevel {
        QualityLevel::of(self.score)
    }

    fn penalize(&mut self, amount: f64, issue: String) {
        self.score = (self.score - amount).max(0.0);
        self.issues.push(issue);
    }

    fn penalize_each(&mut self, amount: f64, count: usize, what: &str) {
        if count > 0 {
            self.penalize(amount * count as f64, format!("{count} {what}"));
        }
    }
}
