//! Search engines.
//!
//! All three engines share one shape: measure the baseline, then repeatedly
//! derive a candidate from the current best, evaluate it and report one
//! [`StepRecord`] per evaluation. They differ in how candidates are produced
//! and when a better one is adopted.

mod genetic;
mod kbest;
mod local;

pub use genetic::GeneticSearch;
pub use kbest::KBestSearch;
pub use local::{Failure, LocalSearch};

use crate::patch::Patch;
use crate::report::{ReportSink, SearchSummary, StepRecord};
use anyhow::Result;
use patchforge_harness::Outcome;
use patchforge_ir::SourceTree;
use tracing::warn;

/// A search loop over patches of one target method.
pub trait SearchStrategy {
    /// Name of this strategy, for logs and summaries.
    fn name(&self) -> &str;

    /// Run the whole budget, reporting every evaluation to `sink`.
    fn run(&mut self, sink: &mut dyn ReportSink) -> Result<SearchSummary>;
}

/// Hand a record to the sink. A failed write is logged and the run goes on.
fn report(sink: &mut dyn ReportSink, record: &StepRecord) {
    if let Err(e) = sink.record(record) {
        warn!(step = record.step, error = %e, "failed to write step record");
    }
}

fn outcome_message(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::InvalidPatch => "patch invalid",
        Outcome::CompileError => "failed to compile",
        Outcome::TestFailure => "failed to pass all tests",
        Outcome::Success => "passed",
    }
}

/// Improvement of a candidate over the baseline; only successful candidates
/// improve anything.
fn improvement(outcome: Outcome, baseline: f64, metric: f64) -> f64 {
    if outcome.is_success() {
        baseline - metric
    } else {
        0.0
    }
}

struct RunTotals {
    baseline: f64,
    best_fitness: f64,
    steps: usize,
    accepted: usize,
}

fn summarise(strategy: &str, base: &SourceTree, best: &Patch, totals: RunTotals) -> SearchSummary {
    let improvement = if totals.best_fitness < totals.baseline {
        totals.baseline - totals.best_fitness
    } else {
        0.0
    };
    SearchSummary {
        strategy: strategy.to_string(),
        baseline: totals.baseline,
        best_fitness: totals.best_fitness,
        improvement,
        best_patch: best.clone(),
        best_source: best.apply(base).ok().map(|tree| tree.render()),
        steps: totals.steps,
        accepted: totals.accepted,
    }
}
