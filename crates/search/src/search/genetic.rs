//! Population-based search: tournament selection, uniform crossover and
//! single-edit mutation over structural edits.

use super::{improvement, outcome_message, report, summarise, RunTotals, SearchStrategy};
use crate::config::SearchConfig;
use crate::evaluator::FitnessEvaluator;
use crate::mutator::Mutator;
use crate::patch::Patch;
use crate::report::{ReportSink, SearchSummary, StepRecord};
use anyhow::{anyhow, Result};
use patchforge_harness::TestHarness;
use tracing::{debug, info, warn};

/// Share of the population sampled per tournament.
const TOURNAMENT_FRACTION: f64 = 0.2;
/// Chance that a parent's edit is inherited by a child.
const INHERIT_PROBABILITY: f64 = 0.5;

pub struct GeneticSearch<H> {
    evaluator: FitnessEvaluator<H>,
    mutator: Mutator,
    config: SearchConfig,
    rng: fastrand::Rng,
    baseline: f64,
    baseline_fitness: f64,
    best: Patch,
    best_fitness: f64,
    evaluations: usize,
    accepted: usize,
}

impl<H: TestHarness> GeneticSearch<H> {
    pub fn new(evaluator: FitnessEvaluator<H>, config: SearchConfig) -> Self {
        Self {
            evaluator,
            mutator: Mutator::new(config.edit_kinds.clone()),
            rng: fastrand::Rng::with_seed(config.seed),
            config,
            baseline: f64::MAX,
            baseline_fitness: f64::MAX,
            best: Patch::new(),
            best_fitness: f64::MAX,
            evaluations: 0,
            accepted: 0,
        }
    }

    pub fn best(&self) -> &Patch {
        &self.best
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn tournament_size(&self, pool: usize) -> usize {
        let size = (self.config.population_size as f64 * TOURNAMENT_FRACTION).ceil() as usize;
        size.clamp(1, pool.max(1))
    }

    /// Pick half a population by repeated tournaments. A short population
    /// is padded with the empty patch at the baseline fitness.
    pub fn select(&mut self, scored: &[(Patch, f64)]) -> Vec<Patch> {
        let population = self.config.population_size;
        let mut pool = scored.to_vec();
        while pool.len() < population {
            pool.push((Patch::new(), self.baseline_fitness));
        }
        let size = self.tournament_size(pool.len());

        (0..population / 2)
            .map(|_| {
                self.rng.shuffle(&mut pool);
                pool[..size]
                    .iter()
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(patch, _)| patch.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Pair the first half of the shuffled parents with the second half.
    /// Each pair yields both parents and two children, each child taking
    /// every parent edit independently with probability one half.
    pub fn crossover(&mut self, mut parents: Vec<Patch>) -> Vec<Patch> {
        self.rng.shuffle(&mut parents);
        let half = parents.len() / 2;
        let mut offspring = Vec::with_capacity(half * 4);

        for i in 0..half {
            let first = &parents[i];
            let second = &parents[i + half];
            let mut left = Patch::new();
            let mut right = Patch::new();

            for edit in first.edits() {
                if self.rng.f64() < INHERIT_PROBABILITY {
                    left.add(edit.clone());
                }
            }
            for edit in second.edits() {
                if self.rng.f64() < INHERIT_PROBABILITY {
                    left.add(edit.clone());
                }
                if self.rng.f64() < INHERIT_PROBABILITY {
                    right.add(edit.clone());
                }
            }
            for edit in first.edits() {
                if self.rng.f64() < INHERIT_PROBABILITY {
                    right.add(edit.clone());
                }
            }

            offspring.push(first.clone());
            offspring.push(second.clone());
            offspring.push(left);
            offspring.push(right);
        }
        offspring
    }

    fn evaluate_population(
        &mut self,
        generation: usize,
        population: &[Patch],
        sink: &mut dyn ReportSink,
    ) -> Result<Vec<(Patch, f64)>> {
        let mut scored = Vec::with_capacity(population.len());
        for patch in population {
            self.evaluations += 1;
            let result = self.evaluator.evaluate(patch);
            let outcome = result.outcome();
            let metric = self.evaluator.metric().measure(&result);
            let fitness = self.evaluator.fitness(&result);

            let message = if fitness < self.best_fitness {
                self.best = patch.clone();
                self.best_fitness = fitness;
                self.accepted += 1;
                format!("generation {}: new best", generation)
            } else {
                format!("generation {}: {}", generation, outcome_message(outcome))
            };

            let record = StepRecord {
                step: self.evaluations,
                accepted: self.accepted,
                outcome,
                message,
                metric,
                improvement: improvement(outcome, self.baseline, metric),
                description: patch.describe(),
            };
            debug!(step = record.step, outcome = %outcome, fitness, "{}", record.message);
            report(sink, &record);
            scored.push((patch.clone(), fitness));
        }
        Ok(scored)
    }

    fn initialise(&mut self, sink: &mut dyn ReportSink) -> Result<()> {
        self.rng = fastrand::Rng::with_seed(self.config.seed);
        self.evaluations = 0;
        self.accepted = 0;

        let result = self.evaluator.baseline();
        let outcome = result.outcome();
        if !outcome.is_success() {
            warn!(outcome = %outcome, "unmodified program does not pass its tests");
        }
        self.baseline = self.evaluator.metric().measure(&result);
        self.baseline_fitness = self.evaluator.fitness(&result);
        self.best = Patch::new();
        self.best_fitness = self.baseline_fitness;

        info!(baseline = self.baseline, "baseline measured");
        report(sink, &StepRecord {
            step: 0,
            accepted: 0,
            outcome,
            message: "baseline".into(),
            metric: self.baseline,
            improvement: 0.0,
            description: self.best.describe(),
        });
        Ok(())
    }
}

impl<H: TestHarness> SearchStrategy for GeneticSearch<H> {
    fn name(&self) -> &str {
        "genetic"
    }

    fn run(&mut self, sink: &mut dyn ReportSink) -> Result<SearchSummary> {
        info!(
            population = self.config.population_size,
            generations = self.config.generations,
            "running genetic search"
        );
        self.config
            .validate()
            .map_err(|e| anyhow!("invalid search configuration: {}", e))?;
        self.initialise(sink)?;

        let base = self.evaluator.baseline_tree().clone();
        let mut population: Vec<Patch> = (0..self.config.population_size)
            .map(|_| self.mutator.mutate(&Patch::new(), &base, &mut self.rng))
            .collect();

        for generation in 1..=self.config.generations {
            let scored = self.evaluate_population(generation, &population, sink)?;
            let parents = self.select(&scored);
            let offspring = self.crossover(parents);
            population = offspring
                .iter()
                .map(|patch| self.mutator.mutate(patch, &base, &mut self.rng))
                .collect();
            // An unpaired parent leaves the offspring short.
            while population.len() < self.config.population_size {
                let fresh = self.mutator.mutate(&Patch::new(), &base, &mut self.rng);
                population.push(fresh);
            }
            info!(
                generation,
                best = self.best_fitness,
                population = population.len(),
                "generation complete"
            );
        }

        Ok(summarise(
            self.name(),
            &base,
            &self.best,
            RunTotals {
                baseline: self.baseline,
                best_fitness: self.best_fitness,
                steps: self.evaluations,
                accepted: self.accepted,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{EditKind, StructuralEdit};
    use crate::target::TargetMethod;
    use anyhow::Result;
    use patchforge_harness::{FitnessResult, Metric, UnitTest};
    use patchforge_ir::BraceParser;

    struct PassingHarness;

    impl TestHarness for PassingHarness {
        fn run(&self, _: &str, _: &str, _: &[UnitTest]) -> Result<FitnessResult> {
            Ok(FitnessResult::from_tests(Vec::new()))
        }
    }

    fn search(population_size: usize) -> GeneticSearch<PassingHarness> {
        let target = TargetMethod::from_source(
            "class K { void run() { a(); b(); c(); d(); e(); f(); } }",
            "K",
            "run",
            vec![],
            &BraceParser,
        )
        .unwrap();
        let config = SearchConfig {
            population_size,
            edit_kinds: vec![EditKind::Delete],
            ..SearchConfig::default()
        };
        GeneticSearch::new(
            FitnessEvaluator::new(PassingHarness, target, Metric::ExecutionTime),
            config,
        )
    }

    fn single(target: usize) -> Patch {
        let mut patch = Patch::new();
        patch.add(StructuralEdit::Delete { target });
        patch
    }

    #[test]
    fn test_tournament_never_picks_the_unique_worst() {
        let mut search = search(10);
        let scored: Vec<(Patch, f64)> = (0..10)
            .map(|i| {
                let fitness = if i == 0 { f64::MAX } else { i as f64 };
                (single(100 + i), fitness)
            })
            .collect();

        for _ in 0..20 {
            let selected = search.select(&scored);
            assert_eq!(selected.len(), 5);
            assert!(selected.iter().all(|p| *p != single(100)));
        }
    }

    #[test]
    fn test_short_population_is_padded() {
        let mut search = search(6);
        search.baseline_fitness = 1.0;
        let selected = search.select(&[]);
        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(Patch::is_empty));
    }

    #[test]
    fn test_run_rejects_population_without_pairs() {
        let mut search = search(3);
        search.config.generations = 5;
        let mut report = crate::report::MemoryReport::new();

        assert!(search.run(&mut report).is_err());
        assert_eq!(search.evaluations(), 0);
        assert!(report.records().is_empty());
    }

    #[test]
    fn test_every_generation_evaluates_a_full_population() {
        let mut search = search(4);
        search.config.generations = 3;
        let mut report = crate::report::MemoryReport::new();

        let summary = search.run(&mut report).unwrap();
        assert_eq!(search.evaluations(), 12);
        assert_eq!(summary.steps, 12);
    }

    #[test]
    fn test_odd_parent_count_keeps_population_size() {
        let mut search = search(6);
        search.config.generations = 3;

        search.run(&mut crate::report::MemoryReport::new()).unwrap();
        assert_eq!(search.evaluations(), 18);
    }

    #[test]
    fn test_crossover_keeps_parents() {
        let mut search = search(8);
        let parents: Vec<Patch> = (0..4).map(single).collect();

        let offspring = search.crossover(parents.clone());
        assert_eq!(offspring.len(), 8);
        for pair in offspring.chunks(4) {
            assert!(parents.contains(&pair[0]));
            assert!(parents.contains(&pair[1]));
            assert_ne!(pair[0], pair[1]);
            // Children only carry edits inherited from their two parents.
            for child in &pair[2..] {
                assert!(child
                    .edits()
                    .iter()
                    .all(|e| pair[0].edits().contains(e) || pair[1].edits().contains(e)));
            }
        }
    }
}
