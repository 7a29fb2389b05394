//! Process memory statistics for the measurement runner.
//!
//! Values come from `/proc/self/status` on Linux. Other platforms report 0
//! so that the runner keeps working without memory figures.

/// Extracts the numeric value (in kB) of a `Key:   1234 kB` line.
fn parse_status_kb(status: &str, key: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix(':'))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

#[cfg(target_os = "linux")]
fn read_status_kb(key: &str) -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| parse_status_kb(&status, key))
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn read_status_kb(_key: &str) -> u64 {
    use std::sync::Once;
    static WARN_ONCE: Once = Once::new();
    WARN_ONCE.call_once(|| {
        log::warn!("Memory statistics are only supported on Linux; reporting 0.");
    });
    0
}

/// Peak resident set size (`VmHWM`) of the process in kB.
pub fn get_peak_rss_kb() -> u64 {
    read_status_kb("VmHWM")
}

/// Current resident set size (`VmRSS`) of the process in kB.
pub fn get_current_rss_kb() -> u64 {
    read_status_kb("VmRSS")
}
