//! Adaptive best-first search driven by generated rewrites.
//!
//! Every step either simplifies the incumbent by dropping one edit or extends
//! it with one generated replacement. After a compile error or test failure
//! the next prompt switches to the error template and carries the failing
//! program and its diagnostic.

use super::{improvement, outcome_message, report, summarise, RunTotals, SearchStrategy};
use crate::config::SearchConfig;
use crate::context::FeedbackContext;
use crate::evaluator::FitnessEvaluator;
use crate::generator::EditGenerator;
use crate::patch::Patch;
use crate::report::{ReportSink, SearchSummary, StepRecord};
use crate::template::{PromptTag, PromptTemplate, TagMap};
use anyhow::Result;
use patchforge_harness::{Outcome, TestHarness};
use tracing::{debug, info, warn};

/// The most recent failing candidate, fed back into the next prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub source: String,
    pub diagnostic: String,
}

pub struct LocalSearch<H> {
    evaluator: FitnessEvaluator<H>,
    generator: EditGenerator,
    regular: PromptTemplate,
    error: PromptTemplate,
    config: SearchConfig,
    rng: fastrand::Rng,
    context: FeedbackContext,
    incumbent: Patch,
    incumbent_fitness: f64,
    baseline: f64,
    last_failure: Option<Failure>,
    accepted: usize,
}

impl<H: TestHarness> LocalSearch<H> {
    pub fn new(evaluator: FitnessEvaluator<H>, generator: EditGenerator, config: SearchConfig) -> Self {
        let rng = fastrand::Rng::with_seed(config.seed);
        Self {
            evaluator,
            generator,
            regular: PromptTemplate::default_regular(),
            error: PromptTemplate::default_error(),
            config,
            rng,
            context: FeedbackContext::new(),
            incumbent: Patch::new(),
            incumbent_fitness: f64::MAX,
            baseline: f64::MAX,
            last_failure: None,
            accepted: 0,
        }
    }

    pub fn with_templates(mut self, regular: PromptTemplate, error: PromptTemplate) -> Self {
        self.regular = regular;
        self.error = error;
        self
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

    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    pub fn context(&self) -> &FeedbackContext {
        &self.context
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Measure the unmodified program and reset all run state.
    pub fn initialise(&mut self, sink: &mut dyn ReportSink) -> Result<f64> {
        self.rng = fastrand::Rng::with_seed(self.config.seed);
        self.incumbent = Patch::new();
        self.last_failure = None;
        self.accepted = 0;

        let result = self.evaluator.baseline();
        let outcome = result.outcome();
        let metric = self.evaluator.metric().measure(&result);
        if !outcome.is_success() {
            warn!(outcome = %outcome, "unmodified program does not pass its tests");
        }
        self.baseline = metric;
        self.incumbent_fitness = self.evaluator.fitness(&result);
        self.context = FeedbackContext::new();
        self.context.set_original_fitness(metric);

        info!(
            baseline = metric,
            unit = self.evaluator.metric().unit(),
            "baseline measured"
        );
        report(sink, &StepRecord {
            step: 0,
            accepted: 0,
            outcome,
            message: "baseline".into(),
            metric,
            improvement: 0.0,
            description: self.incumbent.describe(),
        });
        Ok(metric)
    }

    /// Run one step. `initialise` must have been called.
    pub fn step(&mut self, step: usize, sink: &mut dyn ReportSink) -> Result<StepRecord> {
        let mut metadata = TagMap::new();
        metadata.insert(PromptTag::Context, self.context.render());
        let template = match &self.last_failure {
            Some(failure) => {
                metadata.insert(PromptTag::Previous, failure.source.clone());
                metadata.insert(PromptTag::Error, failure.diagnostic.clone());
                self.error.clone()
            }
            None => self.regular.clone(),
        };

        let (candidate, description) = self.neighbour(&template, &metadata);
        let result = self.evaluator.evaluate(&candidate);
        let outcome = result.outcome();
        let metric = self.evaluator.metric().measure(&result);
        let unit = self.evaluator.metric().unit();

        self.last_failure = None;
        let message = match outcome {
            Outcome::InvalidPatch => outcome_message(outcome).to_string(),
            Outcome::CompileError | Outcome::TestFailure => {
                self.last_failure = Some(Failure {
                    source: result.patched_source.clone().unwrap_or_default(),
                    diagnostic: result.diagnostic().unwrap_or_default(),
                });
                outcome_message(outcome).to_string()
            }
            Outcome::Success if metric < self.incumbent_fitness => {
                self.incumbent = candidate;
                self.incumbent_fitness = metric;
                self.accepted += 1;
                format!("new best: {} {}", metric, unit)
            }
            Outcome::Success => format!("{} {}", metric, unit),
        };

        if outcome != Outcome::InvalidPatch {
            self.context.push(&description, metric);
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
        info!(
            step,
            outcome = %record.outcome,
            metric,
            patch = %self.incumbent,
            "{}",
            record.message
        );
        report(sink, &record);
        Ok(record)
    }

    /// Derive a candidate from the incumbent: drop one edit, or add one
    /// generated rewrite.
    fn neighbour(&mut self, template: &PromptTemplate, metadata: &TagMap) -> (Patch, String) {
        let mut candidate = self.incumbent.clone();

        if !candidate.is_empty() && self.rng.f64() < self.config.simplify_probability {
            let index = self.rng.usize(..candidate.len());
            if let Some(removed) = candidate.remove(index) {
                let description = format!("remove edit {}: {}", index, removed.describe());
                debug!(%description, "simplifying incumbent");
                return (candidate, description);
            }
        }

        let base = self.evaluator.baseline_tree();
        let current = match candidate.apply(base) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(error = %e, "incumbent no longer applies, addressing the baseline");
                base.clone()
            }
        };

        match self
            .generator
            .generate(&current, &mut self.rng, template, metadata)
        {
            Some(edit) => {
                let description = edit.describe();
                candidate.add(edit);
                (candidate, description)
            }
            None => (candidate, "no statement to rewrite".into()),
        }
    }
}

impl<H: TestHarness> SearchStrategy for LocalSearch<H> {
    fn name(&self) -> &str {
        "local"
    }

    fn run(&mut self, sink: &mut dyn ReportSink) -> Result<SearchSummary> {
        info!(
            steps = self.config.steps,
            backend = self.generator.backend().name(),
            "running best-first local search"
        );
        self.initialise(sink)?;
        for step in 1..=self.config.steps {
            self.step(step, sink)?;
        }

        let summary = summarise(
            self.name(),
            self.evaluator.baseline_tree(),
            &self.incumbent,
            RunTotals {
                baseline: self.baseline,
                best_fitness: self.incumbent_fitness,
                steps: self.config.steps,
                accepted: self.accepted,
            },
        );
        info!(
            best = summary.best_fitness,
            improvement = summary.improvement,
            accepted = summary.accepted,
            "local search finished"
        );
        Ok(summary)
    }
}
