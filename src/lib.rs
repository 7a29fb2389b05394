//! Spectral norm of an implicit matrix, computed by power iteration.
//!
//! This crate implements the classic spectral-norm micro-benchmark. For a
//! dimension `n` it approximates the largest singular value of the `n x n`
//! matrix
//!
//! ```text
//! a(i, j) = 1 / ((i + j)(i + j + 1) / 2 + i + 1),    0 <= i, j < n
//! ```
//!
//! without ever storing it. Each entry is recomputed inside the matrix-vector
//! products, so one product costs O(n²) floating-point work and O(n) memory.
//!
//! ## Algorithm
//!
//! Starting from the all-ones vector `u`, every step applies `AᵗA` twice:
//!
//! ```text
//! v = Aᵗ(A u)
//! u = Aᵗ(A v)
//! ```
//!
//! After the last step the estimate is the square root of the Rayleigh quotient
//! `<u, v> / <v, v>`. The reference benchmark runs 10 steps, which gives
//! `1.274219991` for `n = 100`.
//!
//! ## Example Usage
//!
//! ```rust
//! use faer::Par;
//! use spectral_norm::{SpectralNormConfig, spectral_norm, spectral_norm_with};
//!
//! // Reference policy: 10 steps, sequential.
//! let norm = spectral_norm(100).unwrap();
//! assert!((norm - 1.274219991).abs() < 1e-9);
//!
//! // Same computation, rows split across 4 rayon workers.
//! let config = SpectralNormConfig::default().with_par(Par::rayon(4));
//! let out = spectral_norm_with(100, &config).unwrap();
//! assert_eq!(out.estimate, norm);
//!
//! // The dimension must be at least 1.
//! assert!(spectral_norm(0).is_err());
//! ```
//!
//! ## Crate layout
//!
//! - [`matrix`]: the element function, slice kernels `Av`, `Aᵗv`, `AᵗAv`, and
//!   [`ImplicitMatrix`], a faer matrix-free operator.
//! - [`algorithms::power`]: a power iteration on `AᵗA` for any
//!   [`faer::matrix_free::BiLinOp`].
//! - [`solvers`]: the high-level entry points.
//! - [`utils`]: the measurement harness (time, RAPL energy, memory) used by the
//!   `energy_runner` binary. The kernel does not depend on it.

pub mod algorithms;
pub mod config;
pub mod error;
pub mod matrix;
pub mod solvers;
pub mod utils;

pub use algorithms::PowerIterationOutput;
pub use config::{DEFAULT_STEPS, SpectralNormConfig};
pub use error::SpectralNormError;
pub use matrix::ImplicitMatrix;
pub use solvers::{spectral_norm, spectral_norm_with, spectral_norm_with_callback};
