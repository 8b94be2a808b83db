//! Measurement probe around one test execution.

use crate::energy::{EnergySample, EnergySampler};
use crate::result::TestMetrics;
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
struct ChildUsage {
    cpu_ns: u64,
    max_rss_kb: i64,
}

/// Brackets a child process run: wall clock, child CPU, peak RSS and energy.
pub struct Probe<'a> {
    sampler: &'a dyn EnergySampler,
    started: Instant,
    usage: ChildUsage,
    energy: Option<EnergySample>,
}

impl<'a> Probe<'a> {
    pub fn start(sampler: &'a dyn EnergySampler) -> Self {
        let energy = match sampler.sample() {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(error = %e, "energy sample failed, reporting 0 J");
                None
            }
        };
        let usage = child_usage();
        Self {
            sampler,
            started: Instant::now(),
            usage,
            energy,
        }
    }

    pub fn finish(self) -> TestMetrics {
        let wall_time_ns = self.started.elapsed().as_nanos() as u64;
        let usage = child_usage();
        let energy_joules = match (self.energy, self.sampler.sample()) {
            (Some(start), Ok(end)) => self.sampler.joules_between(&start, &end),
            _ => 0.0,
        };
        TestMetrics {
            wall_time_ns,
            cpu_time_ns: usage.cpu_ns.saturating_sub(self.usage.cpu_ns),
            memory_delta_kb: usage.max_rss_kb - self.usage.max_rss_kb,
            energy_joules,
        }
    }
}

/// `RUSAGE_CHILDREN` totals over every reaped child. CPU time is summed, so
/// its difference is one test's share; `ru_maxrss` is the largest single
/// child seen so far, so its difference is only the rise of that peak.
#[cfg(unix)]
fn child_usage() -> ChildUsage {
    // SAFETY: getrusage only writes into the zeroed struct we own.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) };
    if rc != 0 {
        return ChildUsage::default();
    }
    let to_ns = |tv: libc::timeval| tv.tv_sec as u64 * 1_000_000_000 + tv.tv_usec as u64 * 1_000;
    ChildUsage {
        cpu_ns: to_ns(usage.ru_utime) + to_ns(usage.ru_stime),
        max_rss_kb: usage.ru_maxrss as i64,
    }
}

#[cfg(not(unix))]
fn child_usage() -> ChildUsage {
    ChildUsage::default()
}
