//! Cash available for distribution and realized write-offs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sluice_core::types::{Direction, Transaction, TransactionStatus};

/// Distributable cash for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CashSummary {
    /// Settled interest, fee and recovery inflows.
    pub inflows: Decimal,
    /// Settled outflows of the same kinds.
    pub outflows: Decimal,
    /// `max(inflows − outflows, 0)`.
    pub distributable: Decimal,
}

/// Sums settled distributable flows.
///
/// Principal, pending, failed and defaulted transactions are ignored.
pub fn distributable_cash<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> CashSummary {
    let mut summary = CashSummary::default();
    for t in transactions {
        if !t.is_settled() || !t.kind.is_distributable() {
            continue;
        }
        match t.direction {
            Direction::Inflow => summary.inflows += t.amount,
            Direction::Outflow => summary.outflows += t.amount,
        }
    }
    summary.distributable = (summary.inflows - summary.outflows).max(Decimal::ZERO);
    summary
}

/// Cumulative realized loss: the sum of defaulted outflows.
///
/// Recoveries are not netted here. They reach the tranches as distributable
/// cash through [`distributable_cash`].
pub fn cumulative_write_offs<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Decimal {
    transactions
        .into_iter()
        .filter(|t| t.status == TransactionStatus::Defaulted && t.direction == Direction::Outflow)
        .map(|t| t.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sluice_core::types::CashFlowKind;
    use rust_decimal_macros::dec;

    fn tx(id: &str, amount: Decimal, direction: Direction, kind: CashFlowKind) -> Transaction {
        Transaction::settled(id, "OBL1", Utc::now(), amount, direction, kind)
    }

    #[test]
    fn test_distributable() {
        let txs = vec![
            tx("1", dec!(1000), Direction::Inflow, CashFlowKind::Interest),
            tx("2", dec!(250), Direction::Inflow, CashFlowKind::Fee),
            tx("3", dec!(50000), Direction::Inflow, CashFlowKind::Principal),
            tx("4", dec!(100), Direction::Outflow, CashFlowKind::Fee),
            tx("5", dec!(400), Direction::Inflow, CashFlowKind::Interest)
                .with_status(TransactionStatus::Pending),
        ];
        let cash = distributable_cash(&txs);
        assert_eq!(cash.inflows, dec!(1250));
        assert_eq!(cash.outflows, dec!(100));
        assert_eq!(cash.distributable, dec!(1150));
    }

    #[test]
    fn test_distributable_floored() {
        let txs = vec![
            tx("1", dec!(100), Direction::Inflow, CashFlowKind::Interest),
            tx("2", dec!(300), Direction::Outflow, CashFlowKind::Interest),
        ];
        assert_eq!(distributable_cash(&txs).distributable, Decimal::ZERO);
    }

    #[test]
    fn test_write_offs_are_gross() {
        let txs = vec![
            tx("1", dec!(60000), Direction::Outflow, CashFlowKind::Principal)
                .with_status(TransactionStatus::Defaulted),
            tx("2", dec!(10000), Direction::Inflow, CashFlowKind::Recovery),
            tx("3", dec!(5000), Direction::Outflow, CashFlowKind::Principal),
        ];
        assert_eq!(cumulative_write_offs(&txs), dec!(60000));

        let recovery_only = vec![tx("1", dec!(10), Direction::Inflow, CashFlowKind::Recovery)];
        assert_eq!(cumulative_write_offs(&recovery_only), Decimal::ZERO);
    }

    #[test]
    fn test_recovery_counted_once() {
        let txs = vec![
            tx("1", dec!(60000), Direction::Outflow, CashFlowKind::Principal)
                .with_status(TransactionStatus::Defaulted),
            tx("2", dec!(10000), Direction::Inflow, CashFlowKind::Recovery),
        ];
        assert_eq!(distributable_cash(&txs).distributable, dec!(10000));
        assert_eq!(cumulative_write_offs(&txs), dec!(60000));
    }
}
