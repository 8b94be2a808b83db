//! Evaluation harness for PatchForge.
//!
//! A harness takes the derived source of one candidate, compiles it, runs the
//! tests one at a time and reports a [`FitnessResult`]. Each test execution is
//! bracketed by a [`Probe`] that samples wall-clock time, child CPU time, peak
//! memory and energy.

pub mod command;
pub mod energy;
pub mod harness;
pub mod measure;
pub mod result;

pub use command::{CommandHarness, CommandHarnessConfig};
pub use energy::{EnergySample, EnergySampler, NullSampler, RaplSampler};
pub use harness::{TestHarness, UnitTest};
pub use measure::Probe;
pub use result::{FitnessResult, Metric, Outcome, TestMetrics, TestOutcome};
