//! Measurement runner for the spectral-norm benchmark.
//!
//! Wraps the kernel call in the measurement harness: a number of unmeasured
//! warm-up runs, then measured repetitions recording wall time, package energy
//! (RAPL, when readable) and peak RSS. One CSV row is written per repetition,
//! to `--output` or to stdout.

mod common;

use crate::common::{KernelArgs, init_logger};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use spectral_norm::{
    spectral_norm_with,
    utils::{
        energy::RaplReader,
        measure::{MeasureSettings, run_measured},
        perf::get_current_rss_kb,
    },
};
use std::{fs::File, io, path::PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "energy-runner",
    about = "Measures time and energy of repeated spectral-norm computations."
)]
struct RunnerArgs {
    #[clap(flatten)]
    kernel: KernelArgs,

    /// Unmeasured runs before the measured ones.
    #[clap(long, default_value_t = 0)]
    warmup: usize,

    /// Number of measured runs.
    #[clap(long, default_value_t = 1)]
    repetitions: usize,

    /// Path to the output CSV file; stdout if omitted.
    #[clap(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

/// One row of the output CSV.
#[derive(Debug, Serialize)]
struct RunRecord {
    n: usize,
    steps: usize,
    threads: usize,
    repetition: usize,
    result: f64,
    time_s: f64,
    energy_j: Option<f64>,
    rss_kb: u64,
}

fn main() -> Result<()> {
    init_logger()?;
    let args = RunnerArgs::parse();

    let n = args.kernel.dimension()?;
    let config = args.kernel.config()?;
    let settings = MeasureSettings {
        warmup: args.warmup,
        repetitions: args.repetitions,
    };
    let rapl = RaplReader::discover();
    if let Some(reader) = &rapl {
        log::info!("Reading {} RAPL package domain(s).", reader.num_domains());
    }

    log::info!(
        "Measuring n = {n}, {} steps, {} warm-up and {} measured runs.",
        config.steps,
        settings.warmup,
        settings.repetitions
    );
    let runs = run_measured(&settings, rapl.as_ref(), || spectral_norm_with(n, &config))?;

    let sink: Box<dyn io::Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {path:?}"))?,
        ),
        None => Box::new(io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    for (result, m) in runs {
        let output = result?;
        writer.serialize(RunRecord {
            n,
            steps: output.steps_taken,
            threads: args.kernel.effective_threads(),
            repetition: m.repetition,
            result: output.estimate,
            time_s: m.time_s,
            energy_j: m.energy_j,
            rss_kb: m.rss_kb,
        })?;
    }
    writer.flush()?;
    log::info!("Current RSS after all runs: {} kB.", get_current_rss_kb());

    if let Some(path) = &args.output {
        log::info!("Results saved to {path:?}.");
    }
    Ok(())
}
