//! # Sluice Models
//!
//! Pluggable statistical models for the Sluice credit analytics engine.
//!
//! - **Scoring**: [`CreditScorer`] implementations mapping obligor features
//!   to a default probability. The bundled gradient-boosted ensemble is
//!   checked for monotone constraints at load time; a factor model is
//!   available as a transparent alternative.
//! - **Tail dependence**: [`TailDependenceModel`] implementations reporting
//!   pairwise tail coefficients next to Pearson correlation, plus the
//!   joint-loss tail (Student-t copula or empirical).
//!
//! ## Example
//!
//! ```rust
//! use sluice_core::types::{FeatureVector, Sector};
//! use sluice_models::prelude::*;
//!
//! let scorer = ScoringConfig::default().build().unwrap();
//! let pd = scorer
//!     .score(&FeatureVector::new(1.2, 0.92, Sector::Retail, 6.1))
//!     .unwrap();
//! assert!((0.0..=1.0).contains(&pd));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod scoring;
pub mod tail;

pub use scoring::{score_batch, CreditScorer, ScorerKind, ScoringConfig};
pub use tail::{TailConfig, TailDependenceModel, TailModelKind};

use sluice_core::error::AnalyticsError;
use sluice_math::MathError;

/// Maps a numerical failure into a computation error for `metric`.
pub(crate) fn math_error(metric: &'static str) -> impl Fn(MathError) -> AnalyticsError {
    move |e| AnalyticsError::computation(metric, e.to_string())
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::scoring::{
        score_batch, CreditScorer, FactorScorer, FactorScorerConfig, GradientBoostedTrees,
        ScorerKind, ScoringConfig,
    };
    pub use crate::tail::{
        EmpiricalTailDependence, JointLossEstimate, LossDistribution, PairDependence,
        StudentTCopula, TailConfig, TailDependenceModel, TailDependenceReport, TailInput,
        TailModelKind,
    };
}
