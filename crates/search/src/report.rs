//! Per-step records and run summaries.

use crate::patch::Patch;
use anyhow::{Context, Result};
use patchforge_harness::Outcome;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One line of the search log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 0 is the baseline.
    pub step: usize,
    /// Adoptions so far.
    pub accepted: usize,
    pub outcome: Outcome,
    pub message: String,
    /// Measured metric of this step's candidate.
    pub metric: f64,
    /// Baseline minus metric for successful candidates, else 0.
    pub improvement: f64,
    pub description: String,
}

pub trait ReportSink {
    fn record(&mut self, record: &StepRecord) -> Result<()>;
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryReport {
    records: Vec<StepRecord>,
}

impl MemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }
}

impl ReportSink for MemoryReport {
    fn record(&mut self, record: &StepRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Appends one JSON object per line.
pub struct JsonLinesReport {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesReport {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonLinesReport {
    fn record(&mut self, record: &StepRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub strategy: String,
    pub baseline: f64,
    pub best_fitness: f64,
    /// `baseline - best_fitness`, or 0 when nothing beat the baseline.
    pub improvement: f64,
    pub best_patch: Patch,
    /// Derived source of the best patch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_source: Option<String>,
    pub steps: usize,
    pub accepted: usize,
}

impl SearchSummary {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step: usize) -> StepRecord {
        StepRecord {
            step,
            accepted: 0,
            outcome: Outcome::CompileError,
            message: "failed to compile".into(),
            metric: 0.0,
            improvement: 0.0,
            description: "delete 3".into(),
        }
    }

    #[test]
    fn test_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.jsonl");
        let mut report = JsonLinesReport::create(&path).unwrap();
        report.record(&record(1)).unwrap();
        report.record(&record(2)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<StepRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines, vec![record(1), record(2)]);
        assert!(text.contains("\"outcome\":\"compile_error\""));
    }

    #[test]
    fn test_summary_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = SearchSummary {
            strategy: "local".into(),
            baseline: 10.0,
            best_fitness: 8.0,
            improvement: 2.0,
            best_patch: Patch::new(),
            best_source: None,
            steps: 3,
            accepted: 1,
        };
        summary.save(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["strategy"], "local");
        assert_eq!(value["improvement"], 2.0);
        assert!(value.get("best_source").is_none());
    }
}
