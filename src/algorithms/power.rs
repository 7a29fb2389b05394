//! Power iteration on `AᵗA` for an arbitrary matrix-free operator.
//!
//! The square of the spectral norm of `A` is the dominant eigenvalue of the
//! positive semi-definite operator `B = AᵗA`. Starting from a vector `b`, each
//! step applies `B` twice,
//!
//! ```text
//! v = B u
//! u = B v
//! ```
//!
//! and the estimate after a step is the Rayleigh quotient of the latest pair,
//! `sqrt(<u, v> / <v, v>)` with `u = B v`. For a positive start vector this
//! sequence is non-decreasing and converges to the largest singular value.
//!
//! The driver works on any [`BiLinOp`], so `B` is never formed: the forward
//! product lands in a scratch vector owned by the iteration and is fed straight
//! into the transpose product.

use super::{PowerCallback, PowerIterationOutput, SpectralNormError};
use crate::{config::SpectralNormConfig, error::SpectralNormErrorKind};
use faer::{Mat, MatRef, Par, dyn_stack::MemStack, matrix_free::BiLinOp};

/// The state produced by a single step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerStep {
    /// Number of steps taken, including this one.
    pub step: usize,
    /// The spectral-norm estimate after this step.
    pub estimate: f64,
}

/// A stateful power iteration that yields one [`PowerStep`] at a time.
///
/// All three vectors are allocated once, in [`PowerIteration::new`], and are
/// exclusively owned by the iteration.
pub struct PowerIteration<'a, O: BiLinOp<f64>> {
    operator: &'a O,
    u: Mat<f64>,
    v: Mat<f64>,
    tmp: Mat<f64>,
    steps_taken: usize,
    max_steps: usize,
    par: Par,
}

impl<'a, O: BiLinOp<f64>> PowerIteration<'a, O> {
    /// Validates the inputs and prepares the iteration.
    ///
    /// Nothing is applied here; if this returns an error, the operator has not
    /// been touched.
    pub fn new(
        operator: &'a O,
        b: MatRef<'_, f64>,
        max_steps: usize,
        par: Par,
    ) -> Result<Self, SpectralNormError> {
        let (nrows, ncols) = (operator.nrows(), operator.ncols());
        if nrows != ncols {
            return Err(SpectralNormErrorKind::NonSquareOperator { nrows, ncols }.into());
        }
        if nrows == 0 {
            return Err(SpectralNormErrorKind::InvalidDimension { n: 0 }.into());
        }
        if b.nrows() != ncols {
            return Err(SpectralNormErrorKind::DimensionMismatch {
                operator_cols: ncols,
                vector_rows: b.nrows(),
            }
            .into());
        }
        if b.ncols() != 1 {
            return Err(SpectralNormErrorKind::InputError(format!(
                "The start vector must have exactly one column, got {}.",
                b.ncols()
            ))
            .into());
        }
        if max_steps == 0 {
            return Err(SpectralNormErrorKind::InputError(
                "The number of steps must be at least 1.".to_string(),
            )
            .into());
        }

        let mut all_zero = true;
        for i in 0..nrows {
            let x = b[(i, 0)];
            if !x.is_finite() {
                return Err(SpectralNormErrorKind::InputError(
                    "The start vector must only contain finite values.".to_string(),
                )
                .into());
            }
            all_zero &= x == 0.0;
        }
        if all_zero {
            return Err(SpectralNormErrorKind::InputError(
                "The start vector must not be a zero vector.".to_string(),
            )
            .into());
        }

        Ok(Self {
            operator,
            u: b.to_owned(),
            v: Mat::zeros(nrows, 1),
            tmp: Mat::zeros(nrows, 1),
            steps_taken: 0,
            max_steps,
            par,
        })
    }

    /// Number of steps performed so far.
    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    /// Performs one step and returns the new estimate, or `None` once the step
    /// budget is exhausted.
    pub fn next_step(
        &mut self,
        stack: &mut MemStack,
    ) -> Option<Result<PowerStep, SpectralNormError>> {
        if self.steps_taken >= self.max_steps {
            return None;
        }

        apply_normal(self.operator, &mut self.v, &self.u, &mut self.tmp, self.par, stack);
        apply_normal(self.operator, &mut self.u, &self.v, &mut self.tmp, self.par, stack);
        self.steps_taken += 1;

        Some(self.estimate().map(|estimate| PowerStep {
            step: self.steps_taken,
            estimate,
        }))
    }

    /// The Rayleigh-quotient estimate for the current pair of iterates.
    ///
    /// # Errors
    ///
    /// Returns a breakdown error if no step has been taken yet, or if the
    /// iterate has collapsed to zero or overflowed.
    pub fn estimate(&self) -> Result<f64, SpectralNormError> {
        let breakdown = SpectralNormErrorKind::Breakdown {
            step: self.steps_taken,
        };
        if self.steps_taken == 0 {
            return Err(breakdown.into());
        }

        let vbv = col_dot(self.u.as_ref(), self.v.as_ref());
        let vv = col_dot(self.v.as_ref(), self.v.as_ref());
        let estimate = (vbv / vv).sqrt();
        if vv == 0.0 || !estimate.is_finite() {
            return Err(breakdown.into());
        }
        Ok(estimate)
    }
}

/// `out = Aᵗ (A rhs)`, with `tmp` holding `A rhs`.
fn apply_normal<O: BiLinOp<f64>>(
    operator: &O,
    out: &mut Mat<f64>,
    rhs: &Mat<f64>,
    tmp: &mut Mat<f64>,
    par: Par,
    stack: &mut MemStack,
) {
    operator.apply(tmp.as_mut(), rhs.as_ref(), par, stack);
    operator.transpose_apply(out.as_mut(), tmp.as_ref(), par, stack);
}

/// Sequential dot product of two single-column matrices.
fn col_dot(x: MatRef<'_, f64>, y: MatRef<'_, f64>) -> f64 {
    (0..x.nrows()).fold(0.0, |acc, i| acc + x[(i, 0)] * y[(i, 0)])
}

/// Runs the power iteration on `AᵗA` according to `config`.
///
/// The iteration performs `config.steps` steps unless the optional tolerance
/// is met first (two successive estimates closer than `config.tolerance`) or
/// the callback asks to stop.
///
/// # Arguments
/// * `operator`: The operator `A`, implementing [`BiLinOp`].
/// * `b`: The start vector. Must be non-zero and finite.
/// * `config`: Step budget, tolerance and parallelism.
/// * `stack`: A [`MemStack`] large enough for the operator's `apply` and
///   `transpose_apply` scratch requirements with one right-hand side.
/// * `callback`: An optional observer invoked after every step.
pub fn power_iteration<O: BiLinOp<f64>>(
    operator: &O,
    b: MatRef<'_, f64>,
    config: &SpectralNormConfig,
    stack: &mut MemStack,
    mut callback: Option<&mut PowerCallback<'_>>,
) -> Result<PowerIterationOutput, SpectralNormError> {
    config.validate()?;
    let mut iteration = PowerIteration::new(operator, b, config.steps, config.par)?;

    let mut previous: Option<f64> = None;
    let mut estimate = f64::NAN;
    let mut converged = false;

    while let Some(step) = iteration.next_step(stack) {
        let step = step?;
        estimate = step.estimate;
        log::debug!("power step {}: estimate = {:.12}", step.step, estimate);

        if let Some(ref mut cb) = callback {
            if !cb(step.step, estimate) {
                break;
            }
        }

        if let (Some(tol), Some(prev)) = (config.tolerance, previous) {
            if (estimate - prev).abs() <= tol {
                converged = true;
                break;
            }
        }
        previous = Some(estimate);
    }

    Ok(PowerIterationOutput {
        estimate,
        steps_taken: iteration.steps_taken(),
        converged,
    })
}
