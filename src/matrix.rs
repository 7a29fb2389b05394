//! This module defines the implicit benchmark matrix and its matrix-vector products.
//!
//! The spectral-norm benchmark works on the infinite matrix
//!
//! ```text
//! a(i, j) = 1 / ((i + j)(i + j + 1) / 2 + i + 1)
//! ```
//!
//! truncated to `n x n`. The matrix is never stored: every entry is recomputed
//! from its indices inside the multiply loops, so "building the matrix" and
//! "multiplying by it" are the same code path. Note that `A` is *not* symmetric,
//! the `+ i + 1` term depends on the row only, so the transpose product must swap
//! the indices passed to [`element`].
//!
//! Two layers are provided:
//!
//! 1.  **Slice kernels** ([`mul_av`], [`mul_atv`], [`mul_atav`], [`dot`]) operating
//!     on plain `f64` slices. These are the tight loops of the benchmark.
//! 2.  **[`ImplicitMatrix`]**, which implements faer's matrix-free
//!     [`LinOp`]/[`BiLinOp`] traits on top of the slice kernels, so the matrix can
//!     be handed to the generic power iteration driver or to any other faer
//!     matrix-free algorithm.
//!
//! ## Parallelism
//!
//! Each output row of `Av` and `Atv` only reads the input vector, so the rows are
//! split into disjoint contiguous blocks, one per worker, with [`Par::Rayon`].
//! Every row sum is evaluated in the same order whatever the partition, which
//! makes parallel results bitwise identical to sequential ones.

use crate::error::{SpectralNormError, SpectralNormErrorKind};
use faer::{
    Mat, MatMut, MatRef, Par,
    dyn_stack::{MemStack, StackReq},
    matrix_free::{BiLinOp, LinOp},
};
use rayon::prelude::*;
use faer::reborrow::ReborrowMut;

/// Entry `(i, j)` of the implicit matrix, with zero-based indices.
#[inline(always)]
pub fn element(i: usize, j: usize) -> f64 {
    let t = i + j;
    1.0 / ((t * (t + 1) / 2 + i + 1) as f64)
}

/// Computes `out = A v`.
///
/// # Panics
///
/// Panics if `v` and `out` have different lengths.
pub fn mul_av(v: &[f64], out: &mut [f64], par: Par) {
    assert_eq!(
        v.len(),
        out.len(),
        "Dimension mismatch: input has {} entries but output has {}.",
        v.len(),
        out.len(),
    );
    apply_rows(v, out, par, element);
}

/// Computes `out = Aᵗ v`.
///
/// # Panics
///
/// Panics if `v` and `out` have different lengths.
pub fn mul_atv(v: &[f64], out: &mut [f64], par: Par) {
    assert_eq!(
        v.len(),
        out.len(),
        "Dimension mismatch: input has {} entries but output has {}.",
        v.len(),
        out.len(),
    );
    apply_rows(v, out, par, |i, j| element(j, i));
}

/// Computes `out = Aᵗ (A v)`, using `tmp` for the intermediate product.
///
/// # Panics
///
/// Panics if the three slices do not share the same length.
pub fn mul_atav(v: &[f64], out: &mut [f64], tmp: &mut [f64], par: Par) {
    mul_av(v, tmp, par);
    mul_atv(tmp, out, par);
}

/// Sequential dot product, accumulated left to right.
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y).fold(0.0, |acc, (&a, &b)| acc + a * b)
}

/// Dispatches the row loop sequentially or over disjoint row blocks.
fn apply_rows<F>(v: &[f64], out: &mut [f64], par: Par, entry: F)
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    match par {
        Par::Seq => fill_rows(v, out, 0, &entry),
        Par::Rayon(threads) => {
            let block = out.len().div_ceil(threads.get()).max(1);
            out.par_chunks_mut(block)
                .enumerate()
                .for_each(|(b, rows)| fill_rows(v, rows, b * block, &entry));
        }
    }
}

#[inline(always)]
fn fill_rows<F>(v: &[f64], rows: &mut [f64], first_row: usize, entry: &F)
where
    F: Fn(usize, usize) -> f64,
{
    for (offset, out) in rows.iter_mut().enumerate() {
        let i = first_row + offset;
        *out = v
            .iter()
            .enumerate()
            .fold(0.0, |acc, (j, &vj)| acc + entry(i, j) * vj);
    }
}

/// The benchmark matrix of a given dimension, defined only by its action.
///
/// Constructing one is the single point where the dimension is validated, so
/// an `ImplicitMatrix` always satisfies `n >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplicitMatrix {
    n: usize,
}

impl ImplicitMatrix {
    /// Creates the `n x n` implicit matrix.
    ///
    /// # Errors
    ///
    /// Returns an invalid-dimension error if `n == 0`.
    pub fn new(n: usize) -> Result<Self, SpectralNormError> {
        if n == 0 {
            return Err(SpectralNormErrorKind::InvalidDimension { n: 0 }.into());
        }
        Ok(Self { n })
    }

    /// Returns the dimension `n`.
    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Entry `(i, j)`, checked against the dimension in debug builds.
    #[inline]
    pub fn entry(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.n && j < self.n);
        element(i, j)
    }

    /// Materialises the matrix as a dense faer matrix.
    ///
    /// Only meant for verification on small sizes: it costs `n^2` storage,
    /// which the benchmark itself never pays.
    pub fn to_dense(&self) -> Mat<f64> {
        Mat::from_fn(self.n, self.n, element)
    }

    /// Scratch needed by [`Self::apply_columns`]: one input and one output
    /// column for views that are not contiguous.
    fn column_scratch(&self) -> StackReq {
        StackReq::new::<f64>(self.n).and(StackReq::new::<f64>(self.n))
    }

    /// Applies a slice kernel column by column.
    ///
    /// Contiguous columns are handed to the kernel as they are. Strided views
    /// are gathered into buffers taken from `stack`, so no product allocates.
    fn apply_columns(
        &self,
        mut out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        par: Par,
        stack: &mut MemStack,
        kernel: fn(&[f64], &mut [f64], Par),
    ) {
        assert_eq!(
            self.n,
            rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.n,
            rhs.nrows(),
        );
        assert_eq!(out.nrows(), self.n);
        assert_eq!(out.ncols(), rhs.ncols());

        for k in 0..rhs.ncols() {
            let contiguous = rhs
                .col(k)
                .try_as_col_major()
                .zip(out.rb_mut().col_mut(k).try_as_col_major_mut());
            if let Some((input, output)) = contiguous {
                kernel(input.as_slice(), output.as_slice_mut(), par);
                continue;
            }

            let (input, stack) = stack.make_with::<f64>(self.n, |j| rhs[(j, k)]);
            let (mut output, _) = stack.make_with::<f64>(self.n, |_| 0.0);
            kernel(&input, &mut output, par);
            for (i, &y) in output.iter().enumerate() {
                out[(i, k)] = y;
            }
        }
    }
}

impl TryFrom<i64> for ImplicitMatrix {
    type Error = SpectralNormError;

    /// Accepts signed sizes coming from external sources; anything below 1 is
    /// rejected with the same error as `new(0)`.
    fn try_from(n: i64) -> Result<Self, Self::Error> {
        match usize::try_from(n) {
            Ok(n) if n >= 1 => Ok(Self { n }),
            _ => Err(SpectralNormErrorKind::InvalidDimension { n }.into()),
        }
    }
}

impl LinOp<f64> for ImplicitMatrix {
    fn apply_scratch(&self, _rhs_ncols: usize, _par: Par) -> StackReq {
        self.column_scratch()
    }

    #[inline]
    fn nrows(&self) -> usize {
        self.n
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.n
    }

    fn apply(&self, out: MatMut<'_, f64>, rhs: MatRef<'_, f64>, par: Par, stack: &mut MemStack) {
        self.apply_columns(out, rhs, par, stack, mul_av);
    }

    fn conj_apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        par: Par,
        stack: &mut MemStack,
    ) {
        // Real entries: conjugation is the identity.
        self.apply(out, rhs, par, stack);
    }
}

impl BiLinOp<f64> for ImplicitMatrix {
    fn transpose_apply_scratch(&self, _rhs_ncols: usize, _par: Par) -> StackReq {
        self.column_scratch()
    }

    fn transpose_apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        par: Par,
        stack: &mut MemStack,
    ) {
        self.apply_columns(out, rhs, par, stack, mul_atv);
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
