//! # Sluice Yield
//!
//! Yield distribution for the tranched Sluice pool.
//!
//! - [`cash`]: distributable cash and realized write-offs from settled flows
//! - [`waterfall`]: senior-first allocation with loss cascade and reserve
//! - [`forecast`]: trend forecast of pool yield from realized cash
//! - [`backtest`]: daily replay of pool value with return and drawdown metrics
//! - [`config`]: day count, APY convention and cash rounding
//!
//! ## Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use rust_decimal_macros::dec;
//! use sluice_core::types::{CashFlowKind, Direction, Tranche, TrancheSet, Transaction};
//! use sluice_yield::prelude::*;
//!
//! let tranches = TrancheSet::new(vec![
//!     Tranche::new("senior", 1, dec!(0.2), dec!(1.0)).with_coupon(dec!(0.05)),
//!     Tranche::new("equity", 2, dec!(0.0), dec!(0.2)).with_coupon(dec!(0.12)),
//! ])
//! .unwrap();
//! let start = Utc::now();
//! let txs = vec![Transaction::settled(
//!     "t1", "OBL1", start, dec!(5000), Direction::Inflow, CashFlowKind::Interest,
//! )];
//!
//! let waterfall = YieldEngine::default()
//!     .distribute(&YieldInputs {
//!         tranches: &tranches,
//!         pool_notional: dec!(1_000_000),
//!         transactions: &txs,
//!         period: YieldPeriod::new(start, start + Duration::days(30)).unwrap(),
//!         expected_loss: None,
//!     })
//!     .unwrap();
//! assert_eq!(waterfall.total_allocated() + waterfall.reserve, dec!(5000));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod backtest;
pub mod cash;
pub mod config;
pub mod forecast;
pub mod waterfall;

pub use backtest::{backtest_portfolio, BacktestInputs, BacktestPoint, BacktestReport};
pub use config::{ApyConvention, YieldConfig};
pub use forecast::{forecast_yield, ForecastInputs, ForecastPoint, YieldForecast};
pub use waterfall::{TrancheAllocation, YieldEngine, YieldInputs, YieldPeriod, YieldWaterfall};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::backtest::{backtest_portfolio, BacktestInputs, BacktestPoint, BacktestReport};
    pub use crate::cash::{cumulative_write_offs, distributable_cash, CashSummary};
    pub use crate::config::{ApyConvention, YieldConfig};
    pub use crate::forecast::{forecast_yield, ForecastInputs, ForecastPoint, YieldForecast};
    pub use crate::waterfall::{
        TrancheAllocation, YieldEngine, YieldInputs, YieldPeriod, YieldWaterfall,
    };
}
