//! CLI wiring for PatchForge.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use patchforge_harness::{CommandHarness, CommandHarnessConfig, Metric, RaplSampler, UnitTest};
use patchforge_ir::BraceParser;
use patchforge_llm::{BackendConfig, BackendKind};
use patchforge_search::{
    EditGenerator, EditKind, FitnessEvaluator, GeneticSearch, JsonLinesReport, KBestSearch,
    LocalSearch, MemoryReport, PromptTemplate, ReportSink, SearchConfig, SearchStrategy,
    TargetMethod,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "patchforge",
    about = "Search for faster versions of a method that still pass its tests"
)]
pub struct Cli {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    Openai,
    Ollama,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> BackendKind {
        match value {
            BackendArg::Openai => BackendKind::OpenAi,
            BackendArg::Ollama => BackendKind::Ollama,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum MetricArg {
    ExecutionTime,
    CpuTime,
    Energy,
}

impl From<MetricArg> for Metric {
    fn from(value: MetricArg) -> Metric {
        match value {
            MetricArg::ExecutionTime => Metric::ExecutionTime,
            MetricArg::CpuTime => Metric::CpuTime,
            MetricArg::Energy => Metric::Energy,
        }
    }
}

#[derive(Args, Debug)]
pub struct BackendArgs {
    /// Generation backend.
    #[arg(long, value_enum, default_value = "openai", global = true)]
    pub backend: BackendArg,
    #[arg(long, global = true)]
    pub model: Option<String>,
    /// Base URL (OpenAI-compatible) or host (Ollama).
    #[arg(long, global = true)]
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub llm_timeout: Option<u64>,
    #[arg(long, global = true)]
    pub temperature: Option<f32>,
}

impl BackendArgs {
    fn config(&self) -> BackendConfig {
        BackendConfig {
            kind: self.backend.into(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            timeout_secs: self.llm_timeout,
            temperature: self.temperature,
        }
    }
}

/// Target, harness and run options shared by every search.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Working directory the compile and test commands run in.
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,
    /// Target source file, relative to the working directory.
    #[arg(long)]
    pub source: PathBuf,
    /// Class containing the method.
    #[arg(long)]
    pub class: String,
    /// Method to improve.
    #[arg(long)]
    pub method: String,
    /// Tests to run, comma separated. Substituted for `{test}`.
    #[arg(long, value_delimiter = ',', required = true)]
    pub tests: Vec<String>,
    /// Compile command, run through `sh -c`.
    #[arg(long)]
    pub compile_cmd: String,
    /// Per-test command, run through `sh -c`.
    #[arg(long)]
    pub test_cmd: String,
    /// Exit code a test command uses to report a skipped test.
    #[arg(long)]
    pub skip_exit_code: Option<i32>,
    /// Per-command time limit in seconds.
    #[arg(long)]
    pub command_timeout: Option<u64>,
    /// JSON search configuration; flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, value_enum)]
    pub metric: Option<MetricArg>,
    /// JSON-lines step log.
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// JSON run summary.
    #[arg(long)]
    pub summary: Option<PathBuf>,
    /// Leave the best program in the source file instead of restoring it.
    #[arg(long, default_value_t = false)]
    pub write_best: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Best-first local search with generated rewrites and error feedback.
    Local {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        steps: Option<usize>,
        /// Chance per step of dropping an edit instead of adding one.
        #[arg(long)]
        simplify_probability: Option<f64>,
        /// Prompt template for regular steps.
        #[arg(long)]
        template: Option<PathBuf>,
        /// Prompt template used after a failed step.
        #[arg(long)]
        error_template: Option<PathBuf>,
        /// Project name substituted into prompts.
        #[arg(long)]
        project: Option<String>,
    },
    /// Buffered k-best local search over structural edits.
    Kbest {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        steps: Option<usize>,
        #[arg(long)]
        k: Option<usize>,
        /// Samples per candidate.
        #[arg(long)]
        repeats: Option<usize>,
        #[arg(long, value_delimiter = ',', value_parser = parse_edit_kind)]
        edits: Vec<EditKind>,
    },
    /// Genetic search over structural edits.
    Genetic {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        population: Option<usize>,
        #[arg(long)]
        generations: Option<usize>,
        #[arg(long, value_delimiter = ',', value_parser = parse_edit_kind)]
        edits: Vec<EditKind>,
    },
    /// Check that the generation backend answers.
    CheckBackend,
}

fn parse_edit_kind(s: &str) -> Result<EditKind, String> {
    s.parse()
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli { backend, command } = cli;

    match command {
        Command::CheckBackend => {
            let generation = backend.config().build()?;
            if !generation.test_reachable() {
                bail!("{} backend is not reachable", generation.name());
            }
            info!(backend = generation.name(), "backend reachable");
            println!("{} backend reachable", generation.name());
        }
        Command::Local {
            run,
            steps,
            simplify_probability,
            template,
            error_template,
            project,
        } => {
            let mut config = run.search_config()?;
            if let Some(steps) = steps {
                config.steps = steps;
            }
            if let Some(p) = simplify_probability {
                config.simplify_probability = p;
            }
            if let Some(project) = project {
                config.project_name = project;
            }
            if config.project_name.is_empty() {
                config.project_name = run.class.clone();
            }
            validate(&config)?;

            let regular = match &template {
                Some(path) => PromptTemplate::from_file(path)?,
                None => PromptTemplate::default_regular(),
            };
            let error = match &error_template {
                Some(path) => PromptTemplate::from_file(path)?,
                None => PromptTemplate::default_error(),
            };

            let generator = EditGenerator::new(backend.config().build()?, Box::new(BraceParser))
                .with_project(config.project_name.clone());
            let evaluator = run.evaluator(config.metric)?;
            let mut search =
                LocalSearch::new(evaluator, generator, config).with_templates(regular, error);
            execute(&mut search, &run)?;
        }
        Command::Kbest {
            run,
            steps,
            k,
            repeats,
            edits,
        } => {
            let mut config = run.search_config()?;
            if let Some(steps) = steps {
                config.steps = steps;
            }
            if let Some(k) = k {
                config.k = k;
            }
            if let Some(repeats) = repeats {
                config.repeats = repeats;
            }
            if !edits.is_empty() {
                config.edit_kinds = edits;
            }
            validate(&config)?;

            let evaluator = run.evaluator(config.metric)?;
            let mut search = KBestSearch::new(evaluator, config);
            execute(&mut search, &run)?;
        }
        Command::Genetic {
            run,
            population,
            generations,
            edits,
        } => {
            let mut config = run.search_config()?;
            if let Some(population) = population {
                config.population_size = population;
            }
            if let Some(generations) = generations {
                config.generations = generations;
            }
            if !edits.is_empty() {
                config.edit_kinds = edits;
            }
            validate(&config)?;

            let evaluator = run.evaluator(config.metric)?;
            let mut search = GeneticSearch::new(evaluator, config);
            execute(&mut search, &run)?;
        }
    }

    Ok(())
}

fn validate(config: &SearchConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow!("invalid search configuration: {}", e))
}

impl RunArgs {
    fn search_config(&self) -> Result<SearchConfig> {
        let mut config = match &self.config {
            Some(path) => SearchConfig::load(path)?,
            None => SearchConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(metric) = self.metric {
            config.metric = metric.into();
        }
        Ok(config)
    }

    fn harness_config(&self) -> CommandHarnessConfig {
        CommandHarnessConfig {
            workdir: self.workdir.clone(),
            source_file: self.source.clone(),
            compile_command: self.compile_cmd.clone(),
            test_command: self.test_cmd.clone(),
            skip_exit_code: self.skip_exit_code,
            timeout_secs: self.command_timeout,
        }
    }

    fn evaluator(&self, metric: Metric) -> Result<FitnessEvaluator<CommandHarness>> {
        let harness_config = self.harness_config();
        harness_config
            .validate()
            .map_err(|e| anyhow!("invalid harness configuration: {}", e))?;

        let tests = self.tests.iter().map(UnitTest::new).collect();
        let target = TargetMethod::load(
            harness_config.source_path(),
            &self.class,
            &self.method,
            tests,
            &BraceParser,
        )?;

        let mut harness = CommandHarness::new(harness_config);
        if metric == Metric::Energy {
            let sampler = RaplSampler::discover()
                .context("the energy metric needs readable RAPL counters")?;
            harness = harness.with_sampler(Box::new(sampler));
        }
        Ok(FitnessEvaluator::new(harness, target, metric))
    }
}

fn execute(search: &mut dyn SearchStrategy, run: &RunArgs) -> Result<()> {
    let source_path = run.workdir.join(&run.source);
    let original = std::fs::read_to_string(&source_path)
        .with_context(|| format!("failed to read {}", source_path.display()))?;

    let mut sink: Box<dyn ReportSink> = match &run.report {
        Some(path) => Box::new(JsonLinesReport::create(path)?),
        None => Box::new(MemoryReport::new()),
    };
    let outcome = search.run(sink.as_mut());

    // Every evaluation overwrites the source file.
    let restored = match (&outcome, run.write_best) {
        (Ok(summary), true) => summary.best_source.as_deref().unwrap_or(original.as_str()),
        _ => original.as_str(),
    };
    if let Err(e) = std::fs::write(&source_path, restored) {
        warn!(error = %e, path = %source_path.display(), "failed to restore source file");
    }

    let summary = outcome?;
    if let Some(path) = &run.summary {
        summary.save(path)?;
        info!(path = %path.display(), "summary written");
    }
    info!(
        strategy = %summary.strategy,
        baseline = summary.baseline,
        best = summary.best_fitness,
        improvement = summary.improvement,
        "search finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_kbest() {
        let cli = Cli::try_parse_from([
            "patchforge",
            "--backend",
            "ollama",
            "--model",
            "llama3",
            "kbest",
            "--source",
            "src/Triangle.java",
            "--class",
            "Triangle",
            "--method",
            "classify",
            "--tests",
            "testA,testB",
            "--compile-cmd",
            "javac {source}",
            "--test-cmd",
            "java Runner {test}",
            "--edits",
            "delete,swap",
            "--k",
            "3",
        ])
        .unwrap();

        assert!(matches!(cli.backend.backend, BackendArg::Ollama));
        let Command::Kbest { run, k, edits, .. } = cli.command else {
            panic!("expected kbest");
        };
        assert_eq!(run.tests, vec!["testA", "testB"]);
        assert_eq!(k, Some(3));
        assert_eq!(edits, vec![EditKind::Delete, EditKind::Swap]);

        let config = run.search_config().unwrap();
        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "patchforge",
            "genetic",
            "--source",
            "K.java",
            "--class",
            "K",
            "--method",
            "run",
            "--tests",
            "t",
            "--compile-cmd",
            "true",
            "--test-cmd",
            "true",
            "--seed",
            "9",
            "--metric",
            "cpu-time",
        ])
        .unwrap();
        let Command::Genetic { run, .. } = cli.command else {
            panic!("expected genetic");
        };
        let config = run.search_config().unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.metric, Metric::CpuTime);
    }
}
