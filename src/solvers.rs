//! This module provides the high-level API of the benchmark: the spectral norm
//! of the implicit matrix for a given dimension.

use crate::{
    algorithms::{PowerCallback, PowerIterationOutput, power::power_iteration},
    config::SpectralNormConfig,
    error::SpectralNormError,
    matrix::ImplicitMatrix,
};
use faer::{
    Mat,
    dyn_stack::{MemBuffer, MemStack},
    matrix_free::{BiLinOp, LinOp},
};

/// Computes the spectral norm of the `n x n` implicit matrix with the
/// reference iteration policy (10 steps, sequential).
///
/// # Errors
/// Fails fast with an invalid-dimension error if `n == 0`; no product is
/// computed in that case.
///
/// # Example
/// ```
/// let norm = spectral_norm::spectral_norm(100).unwrap();
/// assert!((norm - 1.274219991).abs() < 1e-9);
/// ```
pub fn spectral_norm(n: usize) -> Result<f64, SpectralNormError> {
    spectral_norm_with(n, &SpectralNormConfig::default()).map(|out| out.estimate)
}

/// Computes the spectral norm of the `n x n` implicit matrix with a custom
/// iteration policy.
///
/// # Arguments
/// * `n`: The dimension. Must be at least 1.
/// * `config`: Number of steps, optional tolerance and parallelism.
///
/// # Returns
/// The full [`PowerIterationOutput`], including how many steps were taken.
pub fn spectral_norm_with(
    n: usize,
    config: &SpectralNormConfig,
) -> Result<PowerIterationOutput, SpectralNormError> {
    run(n, config, None)
}

/// Like [`spectral_norm_with`], invoking `callback` after every step with the
/// step count and the current estimate. Returning `false` stops the iteration.
pub fn spectral_norm_with_callback(
    n: usize,
    config: &SpectralNormConfig,
    callback: &mut PowerCallback<'_>,
) -> Result<PowerIterationOutput, SpectralNormError> {
    run(n, config, Some(callback))
}

fn run(
    n: usize,
    config: &SpectralNormConfig,
    callback: Option<&mut PowerCallback<'_>>,
) -> Result<PowerIterationOutput, SpectralNormError> {
    // Validate everything before allocating the iterates.
    let matrix = ImplicitMatrix::new(n)?;
    config.validate()?;

    let seed = Mat::<f64>::from_fn(n, 1, |_, _| 1.0);
    let mut mem = MemBuffer::new(
        matrix
            .apply_scratch(1, config.par)
            .or(matrix.transpose_apply_scratch(1, config.par)),
    );
    let stack = MemStack::new(&mut mem);

    let output = power_iteration(&matrix, seed.as_ref(), config, stack, callback)?;
    log::debug!(
        "n = {n}: spectral norm {:.9} after {} steps",
        output.estimate,
        output.steps_taken
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Par;

    #[test]
    fn test_reference_value_n_100() {
        let norm = spectral_norm(100).unwrap();
        assert!((norm - 1.274219991).abs() < 1e-9, "got {norm:.12}");
    }

    #[test]
    fn test_single_element_matrix_is_exactly_one() {
        assert_eq!(spectral_norm(1).unwrap(), 1.0);
    }

    #[test]
    fn test_zero_dimension_is_rejected() {
        let err = spectral_norm(0).unwrap_err();
        assert!(err.is_invalid_dimension());
    }

    #[test]
    fn test_default_runs_all_steps() {
        let out = spectral_norm_with(30, &SpectralNormConfig::default()).unwrap();
        assert_eq!(out.steps_taken, 10);
        assert!(!out.converged);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let seq = spectral_norm_with(123, &SpectralNormConfig::default()).unwrap();
        let par = spectral_norm_with(
            123,
            &SpectralNormConfig::default().with_par(Par::rayon(4)),
        )
        .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_work() {
        let mut calls = 0;
        let mut cb = |_: usize, _: f64| {
            calls += 1;
            true
        };
        let result = spectral_norm_with_callback(
            10,
            &SpectralNormConfig::default().with_steps(0),
            &mut cb,
        );
        assert!(result.is_err());
        assert_eq!(calls, 0);
    }
}
