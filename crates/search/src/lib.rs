//! Program-improvement search.
//!
//! A search engine repeatedly derives a candidate [`Patch`] from its current
//! best, evaluates it through a [`FitnessEvaluator`] and keeps whatever
//! measures faster while still passing the tests. Edits come either from a
//! generation backend ([`EditGenerator`]) or from random structural
//! mutation ([`Mutator`]).

pub mod config;
pub mod context;
pub mod edit;
pub mod evaluator;
pub mod generator;
pub mod mutator;
pub mod patch;
pub mod report;
pub mod search;
pub mod target;
pub mod template;

pub use config::SearchConfig;
pub use context::FeedbackContext;
pub use edit::{Edit, EditKind, GeneratedReplacement, StructuralEdit};
pub use evaluator::{FitnessEvaluator, RepeatPolicy, Sampled};
pub use generator::EditGenerator;
pub use mutator::Mutator;
pub use patch::Patch;
pub use report::{JsonLinesReport, MemoryReport, ReportSink, SearchSummary, StepRecord};
pub use search::{Failure, GeneticSearch, KBestSearch, LocalSearch, SearchStrategy};
pub use target::TargetMethod;
pub use template::{PromptTag, PromptTemplate, TagMap};
