//! Shared command-line arguments and setup for the benchmark executables.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use faer::Par;
use spectral_norm::{DEFAULT_STEPS, ImplicitMatrix, SpectralNormConfig};

/// Arguments describing one kernel invocation.
#[derive(Parser, Debug)]
pub struct KernelArgs {
    /// Dimension n of the implicit n x n matrix.
    #[clap(allow_negative_numbers = true)]
    pub n: i64,

    /// Number of power-iteration steps (each applies AᵗA twice).
    #[clap(long, default_value_t = DEFAULT_STEPS)]
    pub steps: usize,

    /// Split matrix rows across this many rayon workers; 0 uses every core.
    /// Omit for a sequential run.
    #[clap(long, value_name = "T")]
    pub threads: Option<usize>,

    /// Stop early once two successive estimates differ by at most this amount.
    #[clap(long, value_name = "TOL")]
    pub tolerance: Option<f64>,
}

impl KernelArgs {
    /// Validates the dimension with the kernel's own rules.
    pub fn dimension(&self) -> Result<usize> {
        Ok(ImplicitMatrix::try_from(self.n)?.dim())
    }

    /// Builds the kernel configuration, sizing the global rayon pool once if
    /// a thread count was requested.
    pub fn config(&self) -> Result<SpectralNormConfig> {
        let mut config = SpectralNormConfig::default().with_steps(self.steps);
        if let Some(tol) = self.tolerance {
            config = config.with_tolerance(tol);
        }
        if let Some(threads) = self.threads {
            if threads > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()
                    .context("Failed to configure the rayon thread pool")?;
            }
            config = config.with_par(Par::rayon(threads));
        }
        config.validate()?;
        Ok(config)
    }

    /// Number of workers actually used, for reporting.
    pub fn effective_threads(&self) -> usize {
        match self.threads {
            None => 1,
            Some(0) => rayon::current_num_threads(),
            Some(t) => t,
        }
    }
}

/// Initialises `env_logger` at `info`, overridable through `RUST_LOG`.
pub fn init_logger() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))
}
