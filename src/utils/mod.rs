//! Measurement utilities used by the benchmark runner.
//!
//! None of this is used by the kernel itself: it wraps a call to it from the
//! outside.
//!
//! - **`energy`**: reads package energy counters through the Linux powercap
//!   (RAPL) interface.
//! - **`measure`**: warm-up/repetition harness recording time, energy and
//!   memory around an opaque call.
//! - **`perf`**: peak and current resident set size from `/proc/self/status`.

pub mod energy;
pub mod measure;
pub mod perf;
