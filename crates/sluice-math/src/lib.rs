//! # Sluice Math
//!
//! Numerical primitives for the Sluice credit analytics engine.
//!
//! - **Statistics**: means, two-pass variance, interpolated quantiles, ranks
//! - **Linear Algebra**: covariance, correlation, eigenvalue guards, shrinkage,
//!   Cholesky factorization
//! - **Distributions**: normal and Student-t CDFs and quantiles
//!
//! ## Design Philosophy
//!
//! - **Numerical Stability**: mean-centred estimators, explicit regularization
//! - **Explicit Failure**: every routine returns a [`MathResult`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]
#![allow(clippy::many_single_char_names)]

pub mod distributions;
pub mod error;
pub mod linear_algebra;
pub mod statistics;

pub use error::{MathError, MathResult};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::distributions::{
        normal_cdf, normal_inv_cdf, student_t_cdf, student_t_inv_cdf, student_t_tail_dependence,
    };
    pub use crate::error::{MathError, MathResult};
    pub use crate::linear_algebra::{
        cholesky, correlation_from_covariance, covariance_matrix, min_eigenvalue,
        quadratic_form, shrink_to_identity, shrinkage_intensity,
    };
    pub use crate::statistics::{
        mean, pearson, pseudo_observations, quantile, quantile_sorted, sample_variance,
        simple_returns, std_dev, tail_mean_sorted,
    };
}
