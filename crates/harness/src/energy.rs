//! Energy counters.
//!
//! On Linux the RAPL powercap interface exposes monotonically increasing
//! microjoule counters that wrap at `max_energy_range_uj`. A sample reads the
//! package zone and, when present, the integrated graphics subzone.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const POWERCAP_ROOT: &str = "/sys/class/powercap";
const PACKAGE_ZONE: &str = "intel-rapl:0";
const ACCELERATOR_ZONE_NAMES: &[&str] = &["uncore", "gpu"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnergySample {
    pub package_uj: u64,
    pub accelerator_uj: u64,
}

pub trait EnergySampler: Send + Sync {
    fn sample(&self) -> Result<EnergySample>;

    /// Joules consumed between two samples.
    fn joules_between(&self, start: &EnergySample, end: &EnergySample) -> f64 {
        let package = end.package_uj.saturating_sub(start.package_uj);
        let accelerator = end.accelerator_uj.saturating_sub(start.accelerator_uj);
        (package + accelerator) as f64 / 1e6
    }
}

/// Always reports zero energy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSampler;

impl EnergySampler for NullSampler {
    fn sample(&self) -> Result<EnergySample> {
        Ok(EnergySample::default())
    }
}

#[derive(Debug, Clone)]
struct Counter {
    path: PathBuf,
    range: u64,
}

impl Counter {
    fn open(zone: &Path) -> Result<Self> {
        let path = zone.join("energy_uj");
        read_u64(&path)?;
        let range = read_u64(&zone.join("max_energy_range_uj")).unwrap_or(u64::MAX);
        Ok(Self { path, range })
    }

    fn read(&self) -> Result<u64> {
        read_u64(&self.path)
    }

    fn delta(&self, start: u64, end: u64) -> u64 {
        if end >= start {
            end - start
        } else {
            self.range.saturating_sub(start).saturating_add(end)
        }
    }
}

/// RAPL powercap reader.
#[derive(Debug, Clone)]
pub struct RaplSampler {
    package: Counter,
    accelerator: Option<Counter>,
}

impl RaplSampler {
    /// Locate the package zone under `/sys/class/powercap`.
    pub fn discover() -> Result<Self> {
        Self::at(Path::new(POWERCAP_ROOT))
    }

    /// Locate the package zone under an arbitrary powercap root.
    pub fn at(root: &Path) -> Result<Self> {
        let zone = root.join(PACKAGE_ZONE);
        let package = Counter::open(&zone)
            .with_context(|| format!("no RAPL package counter under {}", zone.display()))?;
        let accelerator = find_accelerator_zone(&zone).and_then(|sub| Counter::open(&sub).ok());

        tracing::debug!(
            package = %package.path.display(),
            accelerator = accelerator.is_some(),
            "RAPL energy counters found"
        );
        Ok(Self {
            package,
            accelerator,
        })
    }
}

impl EnergySampler for RaplSampler {
    fn sample(&self) -> Result<EnergySample> {
        let package_uj = self.package.read()?;
        let accelerator_uj = match &self.accelerator {
            Some(counter) => counter.read()?,
            None => 0,
        };
        Ok(EnergySample {
            package_uj,
            accelerator_uj,
        })
    }

    fn joules_between(&self, start: &EnergySample, end: &EnergySample) -> f64 {
        let package = self.package.delta(start.package_uj, end.package_uj);
        let accelerator = self
            .accelerator
            .as_ref()
            .map(|c| c.delta(start.accelerator_uj, end.accelerator_uj))
            .unwrap_or(0);
        (package + accelerator) as f64 / 1e6
    }
}

fn find_accelerator_zone(package_zone: &Path) -> Option<PathBuf> {
    let prefix = format!("{}:", PACKAGE_ZONE);
    fs::read_dir(package_zone)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix))
        })
        .find(|path| {
            fs::read_to_string(path.join("name"))
                .map(|name| ACCELERATOR_ZONE_NAMES.contains(&name.trim()))
                .unwrap_or(false)
        })
}

fn read_u64(path: &Path) -> Result<u64> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    text.trim()
        .parse()
        .map_err(|e| anyhow!("bad counter value in {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_zone(dir: &Path, energy: u64, range: u64, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("energy_uj"), format!("{}\n", energy)).unwrap();
        fs::write(dir.join("max_energy_range_uj"), format!("{}\n", range)).unwrap();
        fs::write(dir.join("name"), format!("{}\n", name)).unwrap();
    }

    #[test]
    fn test_reads_package_and_accelerator() {
        let root = tempfile::tempdir().unwrap();
        let package = root.path().join(PACKAGE_ZONE);
        write_zone(&package, 1_000_000, 10_000_000, "package-0");
        write_zone(&package.join("intel-rapl:0:1"), 250_000, 10_000_000, "uncore");

        let sampler = RaplSampler::at(root.path()).unwrap();
        let sample = sampler.sample().unwrap();
        assert_eq!(
            sample,
            EnergySample {
                package_uj: 1_000_000,
                accelerator_uj: 250_000
            }
        );
    }

    #[test]
    fn test_wraparound() {
        let root = tempfile::tempdir().unwrap();
        write_zone(&root.path().join(PACKAGE_ZONE), 0, 1_000_000, "package-0");
        let sampler = RaplSampler::at(root.path()).unwrap();

        let start = EnergySample {
            package_uj: 900_000,
            accelerator_uj: 0,
        };
        let end = EnergySample {
            package_uj: 100_000,
            accelerator_uj: 0,
        };
        let joules = sampler.joules_between(&start, &end);
        assert!((joules - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_missing_zone() {
        let root = tempfile::tempdir().unwrap();
        assert!(RaplSampler::at(root.path()).is_err());
    }

    #[test]
    fn test_null_sampler() {
        let s = NullSampler;
        let a = s.sample().unwrap();
        assert_eq!(s.joules_between(&a, &a), 0.0);
    }
}
