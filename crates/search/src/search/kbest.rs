//! Buffered k-best local search over structural edits.
//!
//! Candidates that beat the incumbent are not adopted straight away. They are
//! buffered, and once `k` have accumulated the single best of the buffer and
//! the incumbent is committed. Each candidate is measured several times to
//! smooth out timing noise.

use super::{improvement, outcome_message, report, summarise, RunTotals, SearchStrategy};
use crate::config::SearchConfig;
use crate::evaluator::{FitnessEvaluator, RepeatPolicy};
use crate::mutator::Mutator;
use crate::patch::Patch;
use crate::report::{ReportSink, SearchSummary, StepRecord};
use anyhow::Result;
use patchforge_harness::TestHarness;
use tracing::{info, warn};

pub struct KBestSearch<H> {
    evaluator: FitnessEvaluator<H>,
    mutator: Mutator,
    policy: RepeatPolicy,
    config: SearchConfig,
    rng: fastrand::Rng,
    incumbent: Patch,
    incumbent_fitness: f64,
    baseline: f64,
    buffer: Vec<(Patch, f64)>,
    accepted: usize,
}

impl<H: TestHarness> KBestSearch<H> {
    pub fn new(evaluator: FitnessEvaluator<H>, config: SearchConfig) -> Self {
        Self {
            evaluator,
            mutator: Mutator::new(config.edit_kinds.clone()),
            policy: RepeatPolicy::new(config.repeats),
            rng: fastrand::Rng::with_seed(config.seed),
            config,
            incumbent: Patch::new(),
            incumbent_fitness: f64::MAX,
            baseline: f64::MAX,
            buffer: Vec::new(),
            accepted: 0,
        }
    }

    pub fn incumbent(&self) -> &Patch {
        &self.incumbent
    }

    pub fn incumbent_fitness(&self) -> f64 {
        self.incumbent_fitness
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Superior candidates waiting for the next commit.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Mean of `repeats` runs of the unmodified program; resets run state.
    pub fn initialise(&mut self, sink: &mut dyn ReportSink) -> Result<f64> {
        self.rng = fastrand::Rng::with_seed(self.config.seed);
        self.incumbent = Patch::new();
        self.buffer.clear();
        self.accepted = 0;

        let sampled = self.evaluator.evaluate_repeated(&self.incumbent, self.policy);
        let outcome = sampled.result.outcome();
        if !outcome.is_success() {
            warn!(outcome = %outcome, "unmodified program does not pass its tests");
        }
        self.baseline = sampled.mean;
        self.incumbent_fitness = sampled.mean;

        info!(
            baseline = sampled.mean,
            samples = sampled.samples,
            "baseline measured"
        );
        report(sink, &StepRecord {
            step: 0,
            accepted: 0,
            outcome,
            message: "baseline".into(),
            metric: sampled.mean,
            improvement: 0.0,
            description: self.incumbent.describe(),
        });
        Ok(sampled.mean)
    }

    pub fn step(&mut self, step: usize, sink: &mut dyn ReportSink) -> Result<StepRecord> {
        let candidate =
            self.mutator
                .mutate(&self.incumbent, self.evaluator.baseline_tree(), &mut self.rng);
        let description = if candidate.len() > self.incumbent.len() {
            candidate
                .edits()
                .last()
                .map(|edit| edit.describe())
                .unwrap_or_default()
        } else {
            "no statement to edit".to_string()
        };

        let sampled = self.evaluator.evaluate_repeated(&candidate, self.policy);
        let outcome = sampled.result.outcome();
        let metric = if outcome.is_success() {
            sampled.mean
        } else {
            self.evaluator.metric().measure(&sampled.result)
        };

        let message = if outcome.is_success() && sampled.mean < self.incumbent_fitness {
            self.buffer.push((candidate, sampled.mean));
            format!("buffered {}/{}", self.buffer.len(), self.config.k)
        } else {
            outcome_message(outcome).to_string()
        };

        if self.buffer.len() >= self.config.k {
            self.commit();
        }

        let record = StepRecord {
            step,
            accepted: self.accepted,
            outcome,
            message,
            metric,
            improvement: improvement(outcome, self.baseline, metric),
            description,
        };
        info!(step, outcome = %record.outcome, metric, "{}", record.message);
        report(sink, &record);
        Ok(record)
    }

    /// Adopt the best of the buffer and the incumbent, then clear the buffer.
    fn commit(&mut self) {
        let mut best = (self.incumbent.clone(), self.incumbent_fitness);
        for (patch, fitness) in self.buffer.drain(..) {
            if fitness < best.1 {
                best = (patch, fitness);
            }
        }
        if best.1 < self.incumbent_fitness {
            self.accepted += 1;
            info!(
                fitness = best.1,
                patch = %best.0,
                "committed best buffered candidate"
            );
        }
        (self.incumbent, self.incumbent_fitness) = best;
    }
}

impl<H: TestHarness> SearchStrategy for KBestSearch<H> {
    fn name(&self) -> &str {
        "kbest"
    }

    fn run(&mut self, sink: &mut dyn ReportSink) -> Result<SearchSummary> {
        info!(
            steps = self.config.steps,
            k = self.config.k,
            repeats = self.policy.repeats,
            "running k-best local search"
        );
        self.initialise(sink)?;
        for step in 1..=self.config.steps {
            self.step(step, sink)?;
        }

        Ok(summarise(
            self.name(),
            self.evaluator.baseline_tree(),
            &self.incumbent,
            RunTotals {
                baseline: self.baseline,
                best_fitness: self.incumbent_fitness,
                steps: self.config.steps,
                accepted: self.accepted,
            },
        ))
    }
}
