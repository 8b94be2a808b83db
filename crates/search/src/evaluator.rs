//! Fitness evaluation: derive, compile, test, measure.

use crate::patch::Patch;
use crate::target::TargetMethod;
use patchforge_harness::{FitnessResult, Metric, TestHarness};
use patchforge_ir::SourceTree;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How many times a candidate is measured before its mean is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatPolicy {
    pub repeats: usize,
}

impl RepeatPolicy {
    pub fn new(repeats: usize) -> Self {
        Self {
            repeats: repeats.max(1),
        }
    }

    pub fn once() -> Self {
        Self::new(1)
    }
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self::once()
    }
}

/// Result of repeated evaluation.
#[derive(Debug, Clone)]
pub struct Sampled {
    /// The last sample taken.
    pub result: FitnessResult,
    /// Mean metric over all samples; `f64::MAX` when any sample failed.
    pub mean: f64,
    pub samples: usize,
}

pub struct FitnessEvaluator<H> {
    harness: H,
    target: TargetMethod,
    metric: Metric,
}

impl<H: TestHarness> FitnessEvaluator<H> {
    pub fn new(harness: H, target: TargetMethod, metric: Metric) -> Self {
        Self {
            harness,
            target,
            metric,
        }
    }

    pub fn target(&self) -> &TargetMethod {
        &self.target
    }

    pub fn baseline_tree(&self) -> &SourceTree {
        &self.target.tree
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn harness(&self) -> &H {
        &self.harness
    }

    /// Evaluate the empty patch.
    pub fn baseline(&self) -> FitnessResult {
        self.evaluate(&Patch::new())
    }

    pub fn evaluate(&self, patch: &Patch) -> FitnessResult {
        let tree = match patch.apply(&self.target.tree) {
            Ok(tree) => tree,
            Err(e) => {
                debug!(error = %e, patch = %patch, "patch does not apply");
                return FitnessResult::invalid_patch();
            }
        };
        let source = tree.render();

        match self
            .harness
            .run(&self.target.class_name, &source, &self.target.tests)
        {
            Ok(result) => result.with_source(source),
            Err(e) => {
                warn!(error = %e, "harness failed, treating candidate as not compiling");
                FitnessResult::compile_failure(format!("{:#}", e)).with_source(source)
            }
        }
    }

    /// Metric value for ranking: the raw measurement on success, otherwise
    /// `f64::MAX`.
    pub fn fitness(&self, result: &FitnessResult) -> f64 {
        if result.outcome().is_success() {
            self.metric.measure(result)
        } else {
            f64::MAX
        }
    }

    /// Evaluate up to `policy.repeats` times, stopping at the first sample
    /// that does not succeed.
    pub fn evaluate_repeated(&self, patch: &Patch, policy: RepeatPolicy) -> Sampled {
        let repeats = policy.repeats.max(1);
        let mut total = 0.0;
        let mut samples = 0;
        let mut result = self.evaluate(patch);
        loop {
            samples += 1;
            if !result.outcome().is_success() {
                return Sampled {
                    result,
                    mean: f64::MAX,
                    samples,
                };
            }
            total += self.metric.measure(&result);
            if samples == repeats {
                break;
            }
            result = self.evaluate(patch);
        }
        Sampled {
            result,
            mean: total / samples as f64,
            samples,
        }
    }
}
