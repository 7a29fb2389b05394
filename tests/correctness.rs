//! Integration test suite for the spectral-norm kernel.
//!
//! # Test Methodology
//!
//! 1.  **Reference values:** the end-to-end result is checked against the
//!     published benchmark output for `n = 100`, and against the degenerate
//!     `n = 1` case where the matrix is the scalar 1.
//! 2.  **Operator identities:** the implicit products are compared with dense
//!     faer products of the explicitly assembled matrix, and `AᵗAv` is checked
//!     to be exactly the composition of `Av` and `Aᵗv`.
//! 3.  **Convergence:** the per-step estimates of the power iteration must be
//!     non-decreasing and settle down.
//! 4.  **Parallelism:** splitting the rows across workers must not change a
//!     single bit of the result.
//! 5.  **Contract:** invalid dimensions are rejected before any product.

use anyhow::{Result, ensure};
use faer::{
    Mat, MatMut, MatRef, Par,
    dyn_stack::{MemBuffer, MemStack, StackReq},
    matrix_free::{BiLinOp, LinOp},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use spectral_norm::{
    ImplicitMatrix, SpectralNormConfig,
    algorithms::power::power_iteration,
    matrix::{mul_atav, mul_atv, mul_av},
    spectral_norm, spectral_norm_with, spectral_norm_with_callback,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Output of the reference benchmark for `n = 100`, printed with nine decimals.
const REFERENCE_N_100: f64 = 1.274219991;

/// Slack for comparisons that should only differ by rounding.
const ROUNDING_TOLERANCE: f64 = 1e-14;

/// Creates a reproducible random vector with entries in `[-1, 1)`.
fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(-1.0..1.0)).collect()
}

/// Runs the default configuration with `steps` steps and records the estimate
/// after every step.
fn estimates_per_step(n: usize, steps: usize) -> Result<Vec<f64>> {
    let mut estimates = Vec::with_capacity(steps);
    let mut record = |_: usize, estimate: f64| {
        estimates.push(estimate);
        true
    };
    spectral_norm_with_callback(
        n,
        &SpectralNormConfig::default().with_steps(steps),
        &mut record,
    )?;
    Ok(estimates)
}

/// A dense operator counting how many products it performs.
#[derive(Debug)]
struct CountingOperator {
    inner: Mat<f64>,
    applications: AtomicUsize,
}

impl CountingOperator {
    fn new(inner: Mat<f64>) -> Self {
        Self {
            inner,
            applications: AtomicUsize::new(0),
        }
    }

    fn applications(&self) -> usize {
        self.applications.load(Ordering::SeqCst)
    }
}

impl LinOp<f64> for CountingOperator {
    fn apply_scratch(&self, rhs_ncols: usize, par: Par) -> StackReq {
        self.inner.as_ref().apply_scratch(rhs_ncols, par)
    }

    fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    fn apply(&self, out: MatMut<'_, f64>, rhs: MatRef<'_, f64>, par: Par, stack: &mut MemStack) {
        self.applications.fetch_add(1, Ordering::SeqCst);
        self.inner.as_ref().apply(out, rhs, par, stack);
    }

    fn conj_apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        par: Par,
        stack: &mut MemStack,
    ) {
        self.apply(out, rhs, par, stack);
    }
}

impl BiLinOp<f64> for CountingOperator {
    fn transpose_apply_scratch(&self, rhs_ncols: usize, par: Par) -> StackReq {
        self.inner.as_ref().transpose_apply_scratch(rhs_ncols, par)
    }

    fn transpose_apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        par: Par,
        stack: &mut MemStack,
    ) {
        self.applications.fetch_add(1, Ordering::SeqCst);
        self.inner.as_ref().transpose_apply(out, rhs, par, stack);
    }

    fn adjoint_apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        par: Par,
        stack: &mut MemStack,
    ) {
        self.transpose_apply(out, rhs, par, stack);
    }
}

// --- Reference values ---

#[test]
fn test_reference_value_for_n_100() -> Result<()> {
    let norm = spectral_norm(100)?;
    ensure!(
        (norm - REFERENCE_N_100).abs() <= 1e-9,
        "n = 100 gave {norm:.12}, expected {REFERENCE_N_100}"
    );
    Ok(())
}

#[test]
fn test_single_entry_matrix_has_norm_one() -> Result<()> {
    ensure!(ImplicitMatrix::new(1)?.entry(0, 0) == 1.0);
    let norm = spectral_norm(1)?;
    ensure!(norm == 1.0, "n = 1 gave {norm}");
    Ok(())
}

#[test]
fn test_estimate_grows_with_n_towards_the_limit() -> Result<()> {
    // The 10-step estimate increases with n and stays below ~1.2742241528,
    // the value printed by the benchmark for very large n.
    let mut previous = 0.0;
    for n in [10, 50, 100, 200, 500] {
        let norm = spectral_norm(n)?;
        ensure!(norm > previous, "n = {n} gave {norm:.12}, not above {previous:.12}");
        ensure!(norm < 1.27422416, "n = {n} gave {norm:.12}");
        previous = norm;
    }
    Ok(())
}

// --- Operator identities ---

/// Generates a test checking `AᵗAv == Aᵗ(Av)` bitwise for a random vector.
macro_rules! generate_composition_test {
    ($test_name:ident, $n:expr, $seed:expr) => {
        #[test]
        fn $test_name() -> Result<()> {
            let n = $n;
            let v = random_vector(n, $seed);

            let mut av = vec![0.0; n];
            let mut composed = vec![0.0; n];
            mul_av(&v, &mut av, Par::Seq);
            mul_atv(&av, &mut composed, Par::Seq);

            let mut tmp = vec![0.0; n];
            let mut fused = vec![0.0; n];
            mul_atav(&v, &mut fused, &mut tmp, Par::Seq);

            ensure!(composed == fused, "AᵗAv differs from Aᵗ(Av) for n = {}", n);
            ensure!(tmp == av, "the scratch buffer must hold Av");
            Ok(())
        }
    };
}

generate_composition_test!(test_composition_n_1, 1, 1);
generate_composition_test!(test_composition_n_17, 17, 2);
generate_composition_test!(test_composition_n_100, 100, 3);

#[test]
fn test_implicit_products_match_dense_faer() -> Result<()> {
    let n = 40;
    let matrix = ImplicitMatrix::new(n)?;
    let dense = matrix.to_dense();
    let v = random_vector(n, 42);
    let v_mat = Mat::from_fn(n, 1, |i, _| v[i]);

    let av_dense = &dense * &v_mat;
    let atv_dense = dense.transpose() * &v_mat;

    let mut mem = MemBuffer::new(
        matrix
            .apply_scratch(1, Par::Seq)
            .or(matrix.transpose_apply_scratch(1, Par::Seq)),
    );
    let stack = MemStack::new(&mut mem);
    let mut av = Mat::<f64>::zeros(n, 1);
    let mut atv = Mat::<f64>::zeros(n, 1);
    matrix.apply(av.as_mut(), v_mat.as_ref(), Par::Seq, stack);
    matrix.transpose_apply(atv.as_mut(), v_mat.as_ref(), Par::Seq, stack);

    let av_err = (&av - &av_dense).norm_l2() / av_dense.norm_l2();
    let atv_err = (&atv - &atv_dense).norm_l2() / atv_dense.norm_l2();
    ensure!(av_err < 1e-13, "Av relative error too high: {av_err}");
    ensure!(atv_err < 1e-13, "Aᵗv relative error too high: {atv_err}");
    Ok(())
}

#[test]
fn test_power_iteration_on_dense_copy_agrees() -> Result<()> {
    let n = 30;
    let matrix = ImplicitMatrix::new(n)?;
    let dense = CountingOperator::new(matrix.to_dense());
    let config = SpectralNormConfig::default();

    let mut mem = MemBuffer::new(
        dense
            .apply_scratch(1, Par::Seq)
            .or(dense.transpose_apply_scratch(1, Par::Seq)),
    );
    let seed = Mat::from_fn(n, 1, |_, _| 1.0);
    let out = power_iteration(&dense, seed.as_ref(), &config, MemStack::new(&mut mem), None)?;
    let implicit = spectral_norm_with(n, &config)?;

    ensure!((out.estimate - implicit.estimate).abs() < 1e-13);
    // Every step applies AᵗA twice: two forward and two transpose products.
    ensure!(
        dense.applications() == 4 * config.steps,
        "expected {} products, counted {}",
        4 * config.steps,
        dense.applications()
    );
    Ok(())
}

// --- Convergence ---

/// Generates a test checking that the estimates are non-decreasing and that
/// successive differences shrink.
macro_rules! generate_convergence_test {
    ($test_name:ident, $n:expr) => {
        #[test]
        fn $test_name() -> Result<()> {
            let estimates = estimates_per_step($n, 15)?;
            ensure!(estimates.len() == 15);

            for (k, w) in estimates.windows(2).enumerate() {
                ensure!(
                    w[1] >= w[0] * (1.0 - ROUNDING_TOLERANCE),
                    "estimate decreased at step {}: {} -> {}",
                    k + 2,
                    w[0],
                    w[1]
                );
            }

            let diffs: Vec<f64> = estimates.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
            for (k, d) in diffs.windows(2).enumerate() {
                ensure!(
                    d[1] <= d[0] + ROUNDING_TOLERANCE,
                    "step difference grew after step {}: {} -> {}",
                    k + 2,
                    d[0],
                    d[1]
                );
            }
            ensure!(
                *diffs.last().unwrap() < 1e-12,
                "no convergence after 15 steps"
            );
            Ok(())
        }
    };
}

generate_convergence_test!(test_convergence_n_10, 10);
generate_convergence_test!(test_convergence_n_50, 50);
generate_convergence_test!(test_convergence_n_100, 100);

#[test]
fn test_tolerance_extension_reaches_reference() -> Result<()> {
    let out = spectral_norm_with(
        100,
        &SpectralNormConfig::default()
            .with_steps(50)
            .with_tolerance(1e-13),
    )?;
    ensure!(out.converged);
    ensure!(out.steps_taken < 50);
    ensure!((out.estimate - REFERENCE_N_100).abs() <= 1e-9);
    Ok(())
}

// --- Parallelism ---

/// Generates a test comparing sequential and row-partitioned runs.
macro_rules! generate_parallel_test {
    ($test_name:ident, $n:expr, $threads:expr) => {
        #[test]
        fn $test_name() -> Result<()> {
            let seq = spectral_norm_with($n, &SpectralNormConfig::default())?;
            let par = spectral_norm_with(
                $n,
                &SpectralNormConfig::default().with_par(Par::rayon($threads)),
            )?;
            ensure!(
                seq.estimate == par.estimate,
                "sequential {} vs parallel {}",
                seq.estimate,
                par.estimate
            );
            Ok(())
        }
    };
}

generate_parallel_test!(test_parallel_n_1_four_workers, 1, 4);
generate_parallel_test!(test_parallel_n_100_two_workers, 100, 2);
generate_parallel_test!(test_parallel_n_333_seven_workers, 333, 7);
generate_parallel_test!(test_parallel_n_100_all_cores, 100, 0);

#[test]
fn test_parallel_kernels_on_random_vector() -> Result<()> {
    let n = 501;
    let v = random_vector(n, 7);
    let (mut seq, mut par) = (vec![0.0; n], vec![0.0; n]);
    let (mut tmp_seq, mut tmp_par) = (vec![0.0; n], vec![0.0; n]);
    mul_atav(&v, &mut seq, &mut tmp_seq, Par::Seq);
    mul_atav(&v, &mut par, &mut tmp_par, Par::rayon(5));
    ensure!(seq == par);
    Ok(())
}

// --- Contract ---

#[test]
fn test_invalid_dimensions_fail_fast() -> Result<()> {
    let mut steps_seen = 0;
    let mut cb = |_: usize, _: f64| {
        steps_seen += 1;
        true
    };
    let err = spectral_norm_with_callback(0, &SpectralNormConfig::default(), &mut cb)
        .err()
        .unwrap();
    ensure!(err.is_invalid_dimension());
    ensure!(steps_seen == 0);

    for n in [0_i64, -5] {
        let err = ImplicitMatrix::try_from(n).err().unwrap();
        ensure!(err.is_invalid_dimension(), "n = {n} was not rejected");
    }
    Ok(())
}

#[test]
fn test_empty_operator_performs_no_products() -> Result<()> {
    let empty = CountingOperator::new(Mat::zeros(0, 0));
    let seed = Mat::<f64>::zeros(0, 1);
    let mut mem = MemBuffer::new(StackReq::EMPTY);

    let result = power_iteration(
        &empty,
        seed.as_ref(),
        &SpectralNormConfig::default(),
        MemStack::new(&mut mem),
        None,
    );
    ensure!(result.err().is_some_and(|e| e.is_invalid_dimension()));
    ensure!(empty.applications() == 0);
    Ok(())
}
