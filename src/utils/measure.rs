//! A small measurement harness wrapping an opaque computation.
//!
//! The harness mirrors the usual benchmark-runner settings: a number of
//! unmeasured warm-up runs followed by a number of measured repetitions. Each
//! measured call is treated as atomic; the harness records wall time, package
//! energy (when RAPL is readable) and the peak resident set size around it,
//! and knows nothing about what the call computes.

use super::{energy::RaplReader, perf::get_peak_rss_kb};
use serde::Serialize;
use std::{hint::black_box, io, time::Instant};
use thiserror::Error;

/// Represents all possible errors of the measurement harness.
#[derive(Error, Debug)]
pub enum MeasureError {
    /// Wraps a standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A counter file did not contain an integer.
    #[error("Parse error: Failed to parse counter from {0}")]
    Parse(String),
    /// The settings do not describe any measured run.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Warm-up and repetition counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureSettings {
    pub warmup: usize,
    pub repetitions: usize,
}

impl Default for MeasureSettings {
    fn default() -> Self {
        Self {
            warmup: 0,
            repetitions: 1,
        }
    }
}

/// Figures recorded around one measured call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    /// Zero-based index of the measured repetition.
    pub repetition: usize,
    /// Wall-clock time in seconds.
    pub time_s: f64,
    /// Package energy in joules, if RAPL counters are readable.
    pub energy_j: Option<f64>,
    /// Peak resident set size of the process after the call, in kB.
    pub rss_kb: u64,
}

/// Runs `f` once and measures it.
pub fn measure<R>(
    rapl: Option<&RaplReader>,
    repetition: usize,
    f: impl FnOnce() -> R,
) -> (R, Measurement) {
    let start_energy = rapl.and_then(|reader| match reader.snapshot() {
        Ok(snapshot) => Some((reader, snapshot)),
        Err(e) => {
            log::warn!("Failed to read energy counters before run {repetition}: {e}");
            None
        }
    });

    let start_time = Instant::now();
    let result = black_box(f());
    let time_s = start_time.elapsed().as_secs_f64();

    let energy_j = start_energy.and_then(|(reader, start)| match reader.snapshot() {
        Ok(end) => Some(reader.joules_between(&start, &end)),
        Err(e) => {
            log::warn!("Failed to read energy counters after run {repetition}: {e}");
            None
        }
    });

    let measurement = Measurement {
        repetition,
        time_s,
        energy_j,
        rss_kb: get_peak_rss_kb(),
    };
    (result, measurement)
}

/// Runs `settings.warmup` unmeasured calls, then `settings.repetitions`
/// measured ones, returning every measured result with its figures.
pub fn run_measured<R, F>(
    settings: &MeasureSettings,
    rapl: Option<&RaplReader>,
    mut f: F,
) -> Result<Vec<(R, Measurement)>, MeasureError>
where
    F: FnMut() -> R,
{
    if settings.repetitions == 0 {
        return Err(MeasureError::InvalidSettings(
            "at least one measured repetition is required".to_string(),
        ));
    }

    for i in 0..settings.warmup {
        log::debug!("warm-up run {}/{}", i + 1, settings.warmup);
        black_box(f());
    }

    Ok((0..settings.repetitions)
        .map(|rep| {
            let (result, m) = measure(rapl, rep, &mut f);
            log::info!(
                "repetition {}/{}: {:.6}s{}",
                rep + 1,
                settings.repetitions,
                m.time_s,
                m.energy_j.map(|j| format!(", {j:.3}J")).unwrap_or_default()
            );
            (result, m)
        })
        .collect())
}
