//! Entry point of the spectral-norm benchmark.
//!
//! Computes the spectral norm of the `n x n` implicit matrix and prints it with
//! nine decimals, the output format of the reference benchmark:
//!
//! ```text
//! $ spectralnorm 100
//! 1.274219991
//! ```

mod common;

use crate::common::{KernelArgs, init_logger};
use anyhow::Result;
use clap::Parser;
use spectral_norm::spectral_norm_with;

#[derive(Parser, Debug)]
#[clap(
    name = "spectralnorm",
    about = "Approximates the spectral norm of the implicit benchmark matrix."
)]
struct Args {
    #[clap(flatten)]
    kernel: KernelArgs,
}

fn main() -> Result<()> {
    init_logger()?;
    let args = Args::parse();

    let n = args.kernel.dimension()?;
    let config = args.kernel.config()?;
    log::debug!(
        "n = {n}, {} steps, {} worker(s)",
        config.steps,
        args.kernel.effective_threads()
    );

    let output = spectral_norm_with(n, &config)?;
    if config.tolerance.is_some() {
        log::info!(
            "{} after {} steps",
            if output.converged {
                "converged"
            } else {
                "not converged"
            },
            output.steps_taken
        );
    }

    println!("{:.9}", output.estimate);
    Ok(())
}
