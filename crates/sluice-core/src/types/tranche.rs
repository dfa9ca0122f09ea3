//! Tranche definitions and loss allocation.
//!
//! Attachment and detachment points are fractions of pool notional held as
//! [`Decimal`] so loss allocation is exact. A [`TrancheSet`] is validated once
//! at load time; a structurally invalid stack is a fatal configuration error.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::ids::TrancheId;

/// A slice of pool risk between an attachment and a detachment point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tranche {
    /// Tranche identifier.
    pub id: TrancheId,
    /// Seniority rank, 1 = most senior.
    pub seniority_rank: u32,
    /// Attachment point as a fraction of pool notional.
    pub attachment: Decimal,
    /// Detachment point as a fraction of pool notional.
    pub detachment: Decimal,
    /// Annual coupon rate on current notional.
    #[serde(default)]
    pub coupon_rate: Decimal,
}

impl Tranche {
    /// Creates a tranche.
    #[must_use]
    pub fn new(
        id: impl Into<TrancheId>,
        seniority_rank: u32,
        attachment: Decimal,
        detachment: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            seniority_rank,
            attachment,
            detachment,
            coupon_rate: Decimal::ZERO,
        }
    }

    /// Sets the coupon rate.
    #[must_use]
    pub fn with_coupon(mut self, coupon_rate: Decimal) -> Self {
        self.coupon_rate = coupon_rate;
        self
    }

    /// Tranche thickness.
    #[must_use]
    pub fn width(&self) -> Decimal {
        self.detachment - self.attachment
    }

    /// Loss absorbed by this tranche for a pool loss fraction:
    /// `clamp(loss - attachment, 0, width)`.
    #[must_use]
    pub fn absorbed_loss(&self, pool_loss: Decimal) -> Decimal {
        (pool_loss - self.attachment)
            .max(Decimal::ZERO)
            .min(self.width())
    }

    /// Remaining width after a pool loss fraction.
    #[must_use]
    pub fn remaining_width(&self, pool_loss: Decimal) -> Decimal {
        self.width() - self.absorbed_loss(pool_loss)
    }
}

/// Loss absorbed by one tranche.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossAllocation {
    /// Tranche identifier.
    pub tranche_id: TrancheId,
    /// Absorbed loss as a fraction of pool notional.
    pub absorbed: Decimal,
    /// Absorbed loss as a fraction of the tranche's own width.
    pub writedown: Decimal,
}

/// A validated, contiguous stack of tranches ordered from most subordinate
/// to most senior.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrancheSet {
    tranches: Vec<Tranche>,
}

impl TrancheSet {
    /// Validates and orders a tranche stack.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Configuration`] for an empty set, inverted or
    /// out-of-range points, gaps or overlaps, a stack not spanning `[0, 1]`,
    /// duplicate ids, or seniority ranks that do not increase with attachment.
    pub fn new(mut tranches: Vec<Tranche>) -> AnalyticsResult<Self> {
        if tranches.is_empty() {
            return Err(AnalyticsError::configuration(
                "tranches",
                "at least one tranche is required",
            ));
        }

        let mut ids = HashSet::new();
        for t in &tranches {
            if !ids.insert(t.id.clone()) {
                return Err(AnalyticsError::configuration(
                    format!("tranches.{}", t.id),
                    "duplicate tranche id",
                ));
            }
            if t.attachment < Decimal::ZERO || t.detachment > Decimal::ONE {
                return Err(AnalyticsError::configuration(
                    format!("tranches.{}", t.id),
                    format!(
                        "attachment/detachment must lie in [0, 1], got {}-{}",
                        t.attachment, t.detachment
                    ),
                ));
            }
            if t.attachment >= t.detachment {
                return Err(AnalyticsError::configuration(
                    format!("tranches.{}", t.id),
                    format!(
                        "attachment {} must be below detachment {}",
                        t.attachment, t.detachment
                    ),
                ));
            }
            if t.coupon_rate < Decimal::ZERO {
                return Err(AnalyticsError::configuration(
                    format!("tranches.{}.coupon_rate", t.id),
                    "coupon rate must be non-negative",
                ));
            }
        }

        tranches.sort_by(|a, b| a.attachment.cmp(&b.attachment));

        if tranches[0].attachment != Decimal::ZERO {
            return Err(AnalyticsError::configuration(
                "tranches",
                format!(
                    "first-loss tranche must attach at 0, got {}",
                    tranches[0].attachment
                ),
            ));
        }

        for pair in tranches.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.attachment < lower.detachment {
                return Err(AnalyticsError::configuration(
                    format!("tranches.{}", upper.id),
                    format!("overlaps {} ({} < {})", lower.id, upper.attachment, lower.detachment),
                ));
            }
            if upper.attachment > lower.detachment {
                return Err(AnalyticsError::configuration(
                    format!("tranches.{}", upper.id),
                    format!("gap after {} ({} > {})", lower.id, upper.attachment, lower.detachment),
                ));
            }
            if upper.seniority_rank >= lower.seniority_rank {
                return Err(AnalyticsError::configuration(
                    format!("tranches.{}", upper.id),
                    format!(
                        "seniority rank {} must be more senior than {} (rank {})",
                        upper.seniority_rank, lower.id, lower.seniority_rank
                    ),
                ));
            }
        }

        if let Some(top) = tranches.last() {
            if top.detachment != Decimal::ONE {
                return Err(AnalyticsError::configuration(
                    format!("tranches.{}", top.id),
                    format!("most senior tranche must detach at 1, got {}", top.detachment),
                ));
            }
        }

        Ok(Self { tranches })
    }

    /// Tranches from most subordinate to most senior.
    pub fn iter(&self) -> impl Iterator<Item = &Tranche> {
        self.tranches.iter()
    }

    /// Tranches from most senior to most subordinate (payment order).
    pub fn by_seniority(&self) -> impl Iterator<Item = &Tranche> {
        self.tranches.iter().rev()
    }

    /// Looks up a tranche by id.
    #[must_use]
    pub fn get(&self, id: &TrancheId) -> Option<&Tranche> {
        self.tranches.iter().find(|t| &t.id == id)
    }

    /// Number of tranches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tranches.len()
    }

    /// Always false for a validated set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tranches.is_empty()
    }

    /// Upper bound of the stack.
    #[must_use]
    pub fn top(&self) -> Decimal {
        self.tranches
            .last()
            .map_or(Decimal::ZERO, |t| t.detachment)
    }

    /// Allocates a pool loss fraction from the first-loss tranche upward.
    #[must_use]
    pub fn allocate_loss(&self, pool_loss: Decimal) -> Vec<LossAllocation> {
        let pool_loss = pool_loss.max(Decimal::ZERO);
        self.tranches
            .iter()
            .map(|t| {
                let absorbed = t.absorbed_loss(pool_loss);
                LossAllocation {
                    tranche_id: t.id.clone(),
                    absorbed,
                    writedown: absorbed / t.width(),
                }
            })
            .collect()
    }
}

impl<'de> Deserialize<'de> for TrancheSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tranches = Vec::<Tranche>::deserialize(deserializer)?;
        TrancheSet::new(tranches).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn two_tranche() -> TrancheSet {
        TrancheSet::new(vec![
            Tranche::new("senior", 1, dec!(0.2), dec!(1.0)),
            Tranche::new("equity", 2, dec!(0.0), dec!(0.2)),
        ])
        .unwrap()
    }

    fn absorbed(set: &TrancheSet, loss: Decimal, id: &str) -> Decimal {
        set.allocate_loss(loss)
            .into_iter()
            .find(|a| a.tranche_id.as_str() == id)
            .map(|a| a.absorbed)
            .unwrap()
    }

    #[test]
    fn test_loss_within_equity() {
        let set = two_tranche();
        assert_eq!(absorbed(&set, dec!(0.15), "equity"), dec!(0.15));
        assert_eq!(absorbed(&set, dec!(0.15), "senior"), dec!(0));
    }

    #[test]
    fn test_loss_cascades_to_senior() {
        let set = two_tranche();
        assert_eq!(absorbed(&set, dec!(0.25), "equity"), dec!(0.20));
        assert_eq!(absorbed(&set, dec!(0.25), "senior"), dec!(0.05));
    }

    #[test]
    fn test_ordering() {
        let set = two_tranche();
        let order: Vec<_> = set.by_seniority().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["senior", "equity"]);
        assert_eq!(set.top(), dec!(1.0));
    }

    #[test]
    fn test_overlap_rejected() {
        let err = TrancheSet::new(vec![
            Tranche::new("senior", 1, dec!(0.15), dec!(1.0)),
            Tranche::new("equity", 2, dec!(0.0), dec!(0.2)),
        ])
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_gap_and_inversion_rejected() {
        assert!(TrancheSet::new(vec![
            Tranche::new("senior", 1, dec!(0.3), dec!(1.0)),
            Tranche::new("equity", 2, dec!(0.0), dec!(0.2)),
        ])
        .is_err());
        assert!(TrancheSet::new(vec![Tranche::new("equity", 1, dec!(0.2), dec!(0.1))]).is_err());
        assert!(TrancheSet::new(vec![]).is_err());
    }

    #[test]
    fn test_stack_must_reach_one() {
        let err = TrancheSet::new(vec![
            Tranche::new("senior", 1, dec!(0.2), dec!(0.8)),
            Tranche::new("equity", 2, dec!(0.0), dec!(0.2)),
        ])
        .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.subject(), "tranches.senior");
        assert!(err.to_string().contains("detach at 1"));
    }

    #[test]
    fn test_rank_order_rejected() {
        assert!(TrancheSet::new(vec![
            Tranche::new("senior", 2, dec!(0.2), dec!(1.0)),
            Tranche::new("equity", 1, dec!(0.0), dec!(0.2)),
        ])
        .is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"[
            {"id": "senior", "seniority_rank": 1, "attachment": "0.1", "detachment": "1.0"},
            {"id": "equity", "seniority_rank": 2, "attachment": "0.0", "detachment": "0.2"}
        ]"#;
        assert!(serde_json::from_str::<TrancheSet>(json).is_err());
    }
}
