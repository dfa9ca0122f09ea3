//! Obligor correlation matrix.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::ids::ObligorId;

/// Symmetric obligor correlation matrix with unit diagonal.
///
/// Construction always symmetrizes, clamps entries into `[-1, 1]` and forces
/// the diagonal to one, so every instance satisfies those invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    obligors: Vec<ObligorId>,
    values: Vec<f64>,
    /// Whether the estimate was shrunk toward the identity.
    pub regularized: bool,
    /// Shrinkage intensity applied (0 when not regularized).
    pub shrinkage: f64,
    /// Number of aligned observations used.
    pub observations: usize,
    /// Obligors whose return series had zero variance.
    #[serde(default)]
    pub degenerate: Vec<ObligorId>,
}

impl CorrelationMatrix {
    /// Builds a matrix from row-major values.
    pub fn from_row_major(obligors: Vec<ObligorId>, values: Vec<f64>) -> AnalyticsResult<Self> {
        let n = obligors.len();
        if values.len() != n * n {
            return Err(AnalyticsError::computation(
                "correlation",
                format!("expected {} entries for {} obligors, got {}", n * n, n, values.len()),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::computation(
                "correlation",
                "non-finite correlation entry",
            ));
        }

        let mut out = vec![0.0; n * n];
        for i in 0..n {
            out[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let v = (0.5 * (values[i * n + j] + values[j * n + i])).clamp(-1.0, 1.0);
                out[i * n + j] = v;
                out[j * n + i] = v;
            }
        }

        Ok(Self {
            obligors,
            values: out,
            regularized: false,
            shrinkage: 0.0,
            observations: 0,
            degenerate: Vec::new(),
        })
    }

    /// Identity matrix over the given obligors.
    #[must_use]
    pub fn identity(obligors: Vec<ObligorId>) -> Self {
        let n = obligors.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
        }
        Self {
            obligors,
            values,
            regularized: false,
            shrinkage: 0.0,
            observations: 0,
            degenerate: Vec::new(),
        }
    }

    /// Records regularization metadata.
    #[must_use]
    pub fn with_regularization(mut self, shrinkage: f64) -> Self {
        self.regularized = shrinkage > 0.0;
        self.shrinkage = shrinkage;
        self
    }

    /// Records the observation count.
    #[must_use]
    pub fn with_observations(mut self, observations: usize) -> Self {
        self.observations = observations;
        self
    }

    /// Records zero-variance obligors.
    #[must_use]
    pub fn with_degenerate(mut self, degenerate: Vec<ObligorId>) -> Self {
        self.degenerate = degenerate;
        self
    }

    /// Matrix dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.obligors.len()
    }

    /// Obligor order of rows and columns.
    #[must_use]
    pub fn obligors(&self) -> &[ObligorId] {
        &self.obligors
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Entry `(i, j)`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.dim() + j]
    }

    /// Row/column index of an obligor.
    #[must_use]
    pub fn index_of(&self, id: &ObligorId) -> Option<usize> {
        self.obligors.iter().position(|o| o == id)
    }

    /// Correlation between two obligors, if both are present.
    #[must_use]
    pub fn between(&self, a: &ObligorId, b: &ObligorId) -> Option<f64> {
        Some(self.get(self.index_of(a)?, self.index_of(b)?))
    }

    /// Moves every off-diagonal entry toward one: `ρ + s(1 − ρ)`.
    ///
    /// Used by stress scenarios. A shift of 0 leaves the matrix unchanged
    /// and 1 makes it fully correlated.
    #[must_use]
    pub fn shifted(&self, shift: f64) -> Self {
        let s = shift.clamp(0.0, 1.0);
        let n = self.dim();
        let mut next = self.clone();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let rho = self.values[i * n + j];
                    next.values[i * n + j] = (rho + s * (1.0 - rho)).clamp(-1.0, 1.0);
                }
            }
        }
        next
    }

    /// Largest absolute off-diagonal entry.
    #[must_use]
    pub fn max_off_diagonal(&self) -> f64 {
        let n = self.dim();
        let mut max = 0.0_f64;
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    max = max.max(self.values[i * n + j].abs());
                }
            }
        }
        max
    }
}
