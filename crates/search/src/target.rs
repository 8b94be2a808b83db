//! The method under improvement.

use anyhow::{anyhow, Context, Result};
use patchforge_harness::UnitTest;
use patchforge_ir::{SourceTree, StatementParser};
use std::path::Path;
use tracing::info;

/// Parsed target class with the method to improve focused, plus the tests
/// that judge it.
#[derive(Debug, Clone)]
pub struct TargetMethod {
    pub class_name: String,
    pub method_name: String,
    pub tests: Vec<UnitTest>,
    pub tree: SourceTree,
}

impl TargetMethod {
    pub fn load(
        source_path: impl AsRef<Path>,
        class_name: &str,
        method_name: &str,
        tests: Vec<UnitTest>,
        parser: &dyn StatementParser,
    ) -> Result<Self> {
        let path = source_path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read target source {}", path.display()))?;
        Self::from_source(&source, class_name, method_name, tests, parser)
            .with_context(|| format!("in {}", path.display()))
    }

    pub fn from_source(
        source: &str,
        class_name: &str,
        method_name: &str,
        tests: Vec<UnitTest>,
        parser: &dyn StatementParser,
    ) -> Result<Self> {
        let tree = SourceTree::parse(source, parser)
            .map_err(|e| anyhow!("failed to parse {}: {}", class_name, e))?
            .focus_method(method_name)?;
        let statements = tree.statement_ids(true).len();
        info!(
            class = class_name,
            method = method_name,
            statements,
            tests = tests.len(),
            "target method loaded"
        );
        Ok(Self {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
            tests,
            tree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchforge_ir::BraceParser;

    #[test]
    fn test_load_focuses_method() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("K.java");
        std::fs::write(&path, "class K { int f() { return 1; } int g() { a(); return 2; } }").unwrap();

        let target = TargetMethod::load(&path, "K", "g", vec![UnitTest::new("t")], &BraceParser).unwrap();
        assert_eq!(target.tree.statement_ids(true).len(), 2);
        assert_eq!(target.tests.len(), 1);
    }

    #[test]
    fn test_missing_method_and_file() {
        let err = TargetMethod::from_source("class K { }", "K", "g", vec![], &BraceParser).unwrap_err();
        assert!(err.to_string().contains("method `g` not found"));

        assert!(TargetMethod::load("/nonexistent/K.java", "K", "g", vec![], &BraceParser).is_err());
    }
}
