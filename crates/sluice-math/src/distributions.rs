//! Standard normal and Student-t helpers on top of `statrs`.

use crate::error::{MathError, MathResult};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

fn standard_normal() -> MathResult<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| MathError::invalid_input(e.to_string()))
}

fn students_t(dof: f64) -> MathResult<StudentsT> {
    if !(dof > 0.0) || !dof.is_finite() {
        return Err(MathError::invalid_input(format!(
            "degrees of freedom must be positive and finite, got {dof}"
        )));
    }
    StudentsT::new(0.0, 1.0, dof).map_err(|e| MathError::invalid_input(e.to_string()))
}

fn check_probability(p: f64) -> MathResult<()> {
    if p > 0.0 && p < 1.0 {
        Ok(())
    } else {
        Err(MathError::invalid_input(format!(
            "probability must lie in (0, 1), got {p}"
        )))
    }
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> MathResult<f64> {
    Ok(standard_normal()?.cdf(x))
}

/// Standard normal quantile.
pub fn normal_inv_cdf(p: f64) -> MathResult<f64> {
    check_probability(p)?;
    Ok(standard_normal()?.inverse_cdf(p))
}

/// Student-t CDF with `dof` degrees of freedom.
pub fn student_t_cdf(x: f64, dof: f64) -> MathResult<f64> {
    Ok(students_t(dof)?.cdf(x))
}

/// Student-t quantile with `dof` degrees of freedom.
pub fn student_t_inv_cdf(p: f64, dof: f64) -> MathResult<f64> {
    check_probability(p)?;
    Ok(students_t(dof)?.inverse_cdf(p))
}

/// Upper-tail dependence coefficient of a bivariate Student-t copula:
/// `λ = 2·t_{ν+1}(−√((ν+1)(1−ρ)/(1+ρ)))`.
pub fn student_t_tail_dependence(rho: f64, dof: f64) -> MathResult<f64> {
    let rho = rho.clamp(-1.0, 1.0);
    if rho >= 1.0 {
        return Ok(1.0);
    }
    if rho <= -1.0 {
        return Ok(0.0);
    }
    let arg = -((dof + 1.0) * (1.0 - rho) / (1.0 + rho)).sqrt();
    Ok((2.0 * student_t_cdf(arg, dof + 1.0)?).clamp(0.0, 1.0))
}
