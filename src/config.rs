//! Iteration policy for the power method.
//!
//! The kernel itself only needs `n`; everything that controls *how* the
//! estimate is obtained lives in [`SpectralNormConfig`]. The defaults reproduce
//! the reference benchmark exactly, so results stay comparable across runs and
//! implementations.

use crate::error::{SpectralNormError, SpectralNormErrorKind};
use faer::Par;

/// Number of power-iteration steps of the reference benchmark.
///
/// One step applies `AᵗA` twice (`v = AᵗA u`, then `u = AᵗA v`).
pub const DEFAULT_STEPS: usize = 10;

/// Configuration of a spectral-norm computation.
#[derive(Debug, Clone, Copy)]
pub struct SpectralNormConfig {
    /// Maximum number of power-iteration steps.
    pub steps: usize,
    /// Optional early-stop threshold on the difference between two successive
    /// estimates. `None` runs exactly `steps` steps.
    pub tolerance: Option<f64>,
    /// Row-level parallelism of the matrix-vector products.
    pub par: Par,
}

impl Default for SpectralNormConfig {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            tolerance: None,
            par: Par::Seq,
        }
    }
}

impl SpectralNormConfig {
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_par(mut self, par: Par) -> Self {
        self.par = par;
        self
    }

    /// Checks the policy knobs before any work is done.
    pub fn validate(&self) -> Result<(), SpectralNormError> {
        if self.steps == 0 {
            return Err(SpectralNormErrorKind::InputError(
                "The number of steps must be at least 1.".to_string(),
            )
            .into());
        }
        if let Some(tol) = self.tolerance {
            if !tol.is_finite() || tol < 0.0 {
                return Err(SpectralNormErrorKind::InputError(format!(
                    "The tolerance must be a finite non-negative number, got {tol}."
                ))
                .into());
            }
        }
        Ok(())
    }
}
