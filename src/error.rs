//! This module defines the custom error types for the library.
//!
//! All contract violations of the spectral-norm kernel and of the generic power
//! iteration driver are collected in a single enum, [`SpectralNormErrorKind`],
//! hidden behind the opaque public type [`SpectralNormError`].
//!
//! The kernel itself cannot fail numerically for a valid dimension, so most
//! variants describe invalid input handed to the driver. They are surfaced
//! immediately and never retried: the computation is pure and retrying an
//! invalid input cannot succeed.
use thiserror::Error;

/// Represents all possible errors that can occur while computing a spectral norm.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct SpectralNormError(#[from] SpectralNormErrorKind);

impl SpectralNormError {
    /// Returns `true` if the error was caused by a dimension outside `N >= 1`.
    pub fn is_invalid_dimension(&self) -> bool {
        matches!(self.0, SpectralNormErrorKind::InvalidDimension { .. })
    }
}

/// Private enum containing the distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum SpectralNormErrorKind {
    /// The requested problem size is not a positive integer.
    #[error("Invalid dimension: n must be at least 1, got {n}.")]
    InvalidDimension { n: i64 },

    /// The operator and the start vector cannot be multiplied.
    #[error(
        "Dimension mismatch: operator has {operator_cols} columns but vector has {vector_rows} rows."
    )]
    DimensionMismatch {
        operator_cols: usize,
        vector_rows: usize,
    },

    /// Power iteration on AᵗA needs an operator whose transpose accepts the
    /// output of the forward product.
    #[error("Operator must be square, got {nrows}x{ncols}.")]
    NonSquareOperator { nrows: usize, ncols: usize },

    /// Indicates that an invalid input parameter was provided to a function.
    #[error("Invalid input parameter: {0}")]
    InputError(String),

    /// The Rayleigh quotient could not be formed, e.g. because the iterate
    /// collapsed to zero or overflowed.
    #[error("Power iteration breakdown at step {step}: the iterate is zero or not finite.")]
    Breakdown { step: usize },
}

impl PartialEq for SpectralNormError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
