//! Evaluation results and their classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of one evaluation, in priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    InvalidPatch,
    CompileError,
    TestFailure,
    Success,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::InvalidPatch => "invalid_patch",
            Outcome::CompileError => "compile_error",
            Outcome::TestFailure => "test_failure",
            Outcome::Success => "success",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource usage of one test execution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TestMetrics {
    pub wall_time_ns: u64,
    pub cpu_time_ns: u64,
    /// Growth of the peak-RSS high-water mark over all reaped children, in
    /// KiB. Zero when the test stays below an earlier child's peak.
    pub memory_delta_kb: i64,
    /// Package plus accelerator energy, in joules.
    pub energy_joules: f64,
}

impl TestMetrics {
    pub fn accumulate(&mut self, other: &TestMetrics) {
        self.wall_time_ns += other.wall_time_ns;
        self.cpu_time_ns += other.cpu_time_ns;
        self.memory_delta_kb += other.memory_delta_kb;
        self.energy_joules += other.energy_joules;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    /// Skipped tests and violated preconditions count as passed.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    pub metrics: TestMetrics,
}

impl TestOutcome {
    pub fn passed(name: impl Into<String>, metrics: TestMetrics) -> Self {
        Self {
            name: name.into(),
            passed: true,
            skipped: false,
            exception: None,
            metrics,
        }
    }

    pub fn skipped(name: impl Into<String>, metrics: TestMetrics) -> Self {
        Self {
            skipped: true,
            ..Self::passed(name, metrics)
        }
    }

    pub fn failed(
        name: impl Into<String>,
        exception: impl Into<String>,
        metrics: TestMetrics,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            skipped: false,
            exception: Some(exception.into()),
            metrics,
        }
    }
}

/// Outcome of compiling and testing one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitnessResult {
    /// Whether a structurally applicable rewrite was produced at all.
    pub valid_patch: bool,
    pub clean_compile: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<String>,
    /// Derived source that was compiled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patched_source: Option<String>,
    #[serde(default)]
    pub tests: Vec<TestOutcome>,
}

impl FitnessResult {
    pub fn invalid_patch() -> Self {
        Self {
            valid_patch: false,
            clean_compile: false,
            compile_error: None,
            patched_source: None,
            tests: Vec::new(),
        }
    }

    pub fn compile_failure(diagnostic: impl Into<String>) -> Self {
        Self {
            valid_patch: true,
            clean_compile: false,
            compile_error: Some(diagnostic.into()),
            patched_source: None,
            tests: Vec::new(),
        }
    }

    pub fn from_tests(tests: Vec<TestOutcome>) -> Self {
        Self {
            valid_patch: true,
            clean_compile: true,
            compile_error: None,
            patched_source: None,
            tests,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.patched_source = Some(source.into());
        self
    }

    pub fn outcome(&self) -> Outcome {
        if !self.valid_patch {
            Outcome::InvalidPatch
        } else if !self.clean_compile {
            Outcome::CompileError
        } else if !self.all_tests_passed() {
            Outcome::TestFailure
        } else {
            Outcome::Success
        }
    }

    pub fn all_tests_passed(&self) -> bool {
        self.tests.iter().all(|test| test.passed)
    }

    /// Sum of all per-test metrics.
    pub fn totals(&self) -> TestMetrics {
        let mut totals = TestMetrics::default();
        for test in &self.tests {
            totals.accumulate(&test.metrics);
        }
        totals
    }

    /// Exception texts of failing tests, newline-separated, in test order.
    pub fn failure_text(&self) -> String {
        self.tests
            .iter()
            .filter(|test| !test.passed)
            .map(|test| test.exception.as_deref().unwrap_or("unknown failure"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text to feed back after a failed candidate: the compiler diagnostic or
    /// the test failures. `None` for invalid and successful candidates.
    pub fn diagnostic(&self) -> Option<String> {
        match self.outcome() {
            Outcome::CompileError => Some(self.compile_error.clone().unwrap_or_default()),
            Outcome::TestFailure => Some(self.failure_text()),
            Outcome::InvalidPatch | Outcome::Success => None,
        }
    }
}

/// Which aggregate is being minimized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Wall-clock nanoseconds.
    #[default]
    ExecutionTime,
    /// Child CPU nanoseconds.
    CpuTime,
    /// Joules.
    Energy,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ExecutionTime => "execution_time",
            Metric::CpuTime => "cpu_time",
            Metric::Energy => "energy",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::ExecutionTime | Metric::CpuTime => "ns",
            Metric::Energy => "J",
        }
    }

    /// Raw aggregate of this metric over every test that ran.
    pub fn measure(&self, result: &FitnessResult) -> f64 {
        let totals = result.totals();
        match self {
            Metric::ExecutionTime => totals.wall_time_ns as f64,
            Metric::CpuTime => totals.cpu_time_ns as f64,
            Metric::Energy => totals.energy_joules,
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "execution_time" | "time" | "runtime" => Ok(Metric::ExecutionTime),
            "cpu_time" | "cpu" => Ok(Metric::CpuTime),
            "energy" => Ok(Metric::Energy),
            other => Err(format!("unknown metric: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(wall: u64, energy: f64) -> TestMetrics {
        TestMetrics {
            wall_time_ns: wall,
            cpu_time_ns: wall / 2,
            memory_delta_kb: 0,
            energy_joules: energy,
        }
    }

    #[test]
    fn test_classification_priority() {
        assert_eq!(FitnessResult::invalid_patch().outcome(), Outcome::InvalidPatch);
        assert_eq!(
            FitnessResult::compile_failure("missing ;").outcome(),
            Outcome::CompileError
        );

        let failing = FitnessResult::from_tests(vec![
            TestOutcome::passed("a", metrics(10, 1.0)),
            TestOutcome::failed("b", "expected 3 but was 4", metrics(10, 1.0)),
        ]);
        assert_eq!(failing.outcome(), Outcome::TestFailure);

        let passing = FitnessResult::from_tests(vec![
            TestOutcome::passed("a", metrics(10, 1.0)),
            TestOutcome::skipped("b", TestMetrics::default()),
        ]);
        assert_eq!(passing.outcome(), Outcome::Success);
    }

    #[test]
    fn test_failure_text_in_test_order() {
        let result = FitnessResult::from_tests(vec![
            TestOutcome::failed("first", "boom", TestMetrics::default()),
            TestOutcome::passed("second", TestMetrics::default()),
            TestOutcome::failed("third", "bang", TestMetrics::default()),
        ]);
        assert_eq!(result.failure_text(), "boom\nbang");
        assert_eq!(result.diagnostic().as_deref(), Some("boom\nbang"));
    }

    #[test]
    fn test_metric_aggregates() {
        let result = FitnessResult::from_tests(vec![
            TestOutcome::passed("a", metrics(100, 0.5)),
            TestOutcome::passed("b", metrics(300, 1.5)),
        ]);
        assert_eq!(Metric::ExecutionTime.measure(&result), 400.0);
        assert_eq!(Metric::CpuTime.measure(&result), 200.0);
        assert_eq!(Metric::Energy.measure(&result), 2.0);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("energy".parse::<Metric>(), Ok(Metric::Energy));
        assert_eq!("cpu-time".parse::<Metric>(), Ok(Metric::CpuTime));
        assert!("latency_p99".parse::<Metric>().is_err());
    }
}
