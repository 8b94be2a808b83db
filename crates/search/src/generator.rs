//! Backend-driven statement rewrites.

use crate::edit::GeneratedReplacement;
use crate::template::{PromptTag, PromptTemplate, TagMap};
use patchforge_ir::{SourceTree, StatementParser};
use patchforge_llm::GenerationBackend;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+#.\-]*[ \t]*\r?\n(.*?)```").expect("valid fence regex")
});

/// Contents of every fenced code block in `response`, in order.
pub fn fenced_blocks(response: &str) -> Vec<&str> {
    FENCED_BLOCK
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Asks the backend for a replacement of one random statement in the target
/// method.
pub struct EditGenerator {
    backend: Box<dyn GenerationBackend>,
    parser: Box<dyn StatementParser>,
    project: String,
}

impl EditGenerator {
    pub fn new(backend: Box<dyn GenerationBackend>, parser: Box<dyn StatementParser>) -> Self {
        Self {
            backend,
            parser,
            project: String::new(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn backend(&self) -> &dyn GenerationBackend {
        self.backend.as_ref()
    }

    /// Produce one rewrite, or `None` when the target method has no
    /// statements. A response without usable code yields the no-suggestion
    /// sentinel.
    pub fn generate(
        &self,
        tree: &SourceTree,
        rng: &mut fastrand::Rng,
        template: &PromptTemplate,
        metadata: &TagMap,
    ) -> Option<GeneratedReplacement> {
        let destination = tree.random_block_id(true, rng)?;
        let destination_text = tree.node_text(destination).unwrap_or_default();

        let mut tags = metadata.clone();
        tags.insert(PromptTag::Count, "1".into());
        tags.insert(PromptTag::Destination, destination_text);
        tags.insert(PromptTag::Project, self.project.clone());
        let prompt = template.render(&tags);

        let response = match self.backend.generate(&prompt) {
            Ok(response) => response,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "generation failed, no suggestion");
                return Some(GeneratedReplacement::no_suggestion(destination, prompt, ""));
            }
        };

        for block in fenced_blocks(&response) {
            match self.parser.parse_statement(block) {
                Ok(statement) => {
                    debug!(destination, "parsed suggested replacement");
                    let replacement_text = block.trim().to_string();
                    return Some(GeneratedReplacement {
                        destination,
                        replacement: Some(statement),
                        replacement_text,
                        prompt,
                        response,
                    });
                }
                Err(e) => debug!(error = %e, "skipping unparseable block"),
            }
        }

        warn!(destination, "LLM gave no usable suggestion");
        Some(GeneratedReplacement::no_suggestion(destination, prompt, response))
    }
}
