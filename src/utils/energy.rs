//! Package energy readings through the Linux powercap (RAPL) interface.
//!
//! Each CPU package exposes a directory `/sys/class/powercap/intel-rapl:<k>`
//! with a monotonically increasing `energy_uj` counter (microjoules) that wraps
//! around at `max_energy_range_uj`. Sub-domains such as `intel-rapl:0:0` (cores,
//! uncore, dram) are contained in the package figure and are skipped.
//!
//! The counters are usually readable by root only. Discovery therefore never
//! fails hard: when no readable domain exists the runner simply reports no
//! energy.

use super::measure::MeasureError;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default location of the powercap tree.
pub const POWERCAP_ROOT: &str = "/sys/class/powercap";

const PACKAGE_PREFIX: &str = "intel-rapl:";

#[derive(Debug, Clone)]
struct RaplDomain {
    name: String,
    energy_path: PathBuf,
    max_range_uj: u64,
}

/// Readers for all package domains found under a powercap root.
#[derive(Debug, Clone)]
pub struct RaplReader {
    domains: Vec<RaplDomain>,
}

/// Raw counter values of every domain at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergySnapshot {
    counters_uj: Vec<u64>,
}

fn read_u64(path: &Path) -> Result<u64, MeasureError> {
    let content = fs::read_to_string(path)?;
    content
        .trim()
        .parse()
        .map_err(|_| MeasureError::Parse(format!("{}: '{}'", path.display(), content.trim())))
}

impl RaplReader {
    /// Discovers the package domains under [`POWERCAP_ROOT`].
    pub fn discover() -> Option<Self> {
        Self::discover_in(POWERCAP_ROOT)
    }

    /// Discovers the package domains under `root`.
    ///
    /// Returns `None` (and logs why) if no domain can be read.
    pub fn discover_in(root: impl AsRef<Path>) -> Option<Self> {
        let root = root.as_ref();
        match Self::try_discover_in(root) {
            Ok(reader) if !reader.domains.is_empty() => {
                log::info!(
                    "RAPL energy domains: {}",
                    reader
                        .domains
                        .iter()
                        .map(|d| d.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                Some(reader)
            }
            Ok(_) => {
                log::warn!("No RAPL package domain under {root:?}; energy will not be reported.");
                None
            }
            Err(e) => {
                log::warn!("RAPL energy counters unavailable under {root:?}: {e}");
                None
            }
        }
    }

    fn try_discover_in(root: &Path) -> Result<Self, MeasureError> {
        let mut domains = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            let Some(dir_name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(index) = dir_name.strip_prefix(PACKAGE_PREFIX) else {
                continue;
            };
            if index.contains(':') {
                continue;
            }

            let energy_path = path.join("energy_uj");
            // Probe the counter now so that permission problems surface at discovery.
            read_u64(&energy_path)?;
            let max_range_uj = read_u64(&path.join("max_energy_range_uj"))?;
            let name = fs::read_to_string(path.join("name"))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| dir_name.to_string());

            domains.push(RaplDomain {
                name,
                energy_path,
                max_range_uj,
            });
        }
        domains.sort_by(|a, b| a.energy_path.cmp(&b.energy_path));
        Ok(Self { domains })
    }

    /// Number of package domains being read.
    pub fn num_domains(&self) -> usize {
        self.domains.len()
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> Result<EnergySnapshot, MeasureError> {
        let counters_uj = self
            .domains
            .iter()
            .map(|d| read_u64(&d.energy_path))
            .collect::<Result<_, _>>()?;
        Ok(EnergySnapshot { counters_uj })
    }

    /// Energy in joules consumed by all packages between `start` and `end`.
    ///
    /// A counter that went backwards is assumed to have wrapped once. A start
    /// value above the advertised range counts as wrapping at that value.
    pub fn joules_between(&self, start: &EnergySnapshot, end: &EnergySnapshot) -> f64 {
        let total_uj: u64 = self
            .domains
            .iter()
            .zip(start.counters_uj.iter().zip(&end.counters_uj))
            .map(|(domain, (&s, &e))| {
                if e >= s {
                    e - s
                } else {
                    domain.max_range_uj.saturating_sub(s) + e
                }
            })
            .sum();
        total_uj as f64 / 1e6
    }
}
