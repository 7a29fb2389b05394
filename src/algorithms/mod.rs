//! Low-level iteration drivers.
//!
//! ** NOTE: We recommend using the high-level functions in [`crate::solvers`]
//! instead. This module is intended for callers that need fine-grained control
//! over the iteration: a custom operator, a custom start vector, or a callback
//! observing every step.

pub mod power;

pub use crate::error::SpectralNormError;

/// A callback invoked after every power-iteration step with the number of
/// steps taken so far and the current estimate. Returning `false` stops the
/// iteration early.
pub type PowerCallback<'a> = dyn FnMut(usize, f64) -> bool + 'a;

/// The result of a power iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerIterationOutput {
    /// The spectral-norm estimate `sqrt(<u, v> / <v, v>)` after the last step.
    pub estimate: f64,
    /// The number of steps actually performed.
    pub steps_taken: usize,
    /// Whether the configured tolerance was met before the step budget ran out.
    /// Always `false` when no tolerance was configured.
    pub converged: bool,
}
