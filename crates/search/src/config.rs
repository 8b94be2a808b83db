//! Search configuration.

use crate::edit::EditKind;
use anyhow::{anyhow, Context, Result};
use patchforge_harness::Metric;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Steps for the local and k-best searches.
    pub steps: usize,
    pub seed: u64,
    pub metric: Metric,
    /// Chance that a local-search step drops an edit instead of adding one.
    pub simplify_probability: f64,
    /// Samples per candidate in the k-best search.
    pub repeats: usize,
    /// Superior candidates buffered before the k-best search commits.
    pub k: usize,
    pub population_size: usize,
    pub generations: usize,
    /// Structural edit kinds for the k-best and genetic searches.
    pub edit_kinds: Vec<EditKind>,
    /// Substituted for `{{PROJECT}}` in prompts.
    pub project_name: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            steps: 100,
            seed: 123,
            metric: Metric::ExecutionTime,
            simplify_probability: 0.5,
            repeats: 5,
            k: 5,
            population_size: 10,
            generations: 10,
            edit_kinds: EditKind::ALL.to_vec(),
            project_name: String::new(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.steps == 0 {
            return Err("steps must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.simplify_probability) {
            return Err(format!(
                "simplify_probability must be within [0, 1], got {}",
                self.simplify_probability
            ));
        }
        if self.repeats == 0 {
            return Err("repeats must be > 0".into());
        }
        if self.k == 0 {
            return Err("k must be > 0".into());
        }
        // Crossover pairs half the population; fewer than four leaves no pairs.
        if self.population_size < 4 {
            return Err("population_size must be >= 4".into());
        }
        if self.generations == 0 {
            return Err("generations must be > 0".into());
        }
        if self.edit_kinds.is_empty() {
            return Err("at least one edit kind is required".into());
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(|e| anyhow!(e))?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            SearchConfig::from_json(r#"{"steps": 7, "metric": "energy", "edit_kinds": ["swap"]}"#)
                .unwrap();
        assert_eq!(config.steps, 7);
        assert_eq!(config.metric, Metric::Energy);
        assert_eq!(config.edit_kinds, vec![EditKind::Swap]);
        assert_eq!(config.k, 5);
        assert_eq!(config.repeats, 5);
    }

    #[test]
    fn test_validation_errors() {
        let bad = SearchConfig {
            simplify_probability: 1.5,
            ..SearchConfig::default()
        };
        assert!(bad.validate().is_err());
        assert!(SearchConfig::from_json(r#"{"k": 0}"#).is_err());
    }

    #[test]
    fn test_population_too_small_to_pair() {
        for population_size in [2, 3] {
            let config = SearchConfig {
                population_size,
                ..SearchConfig::default()
            };
            assert!(config.validate().is_err());
        }
        let config = SearchConfig {
            population_size: 4,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        let config = SearchConfig {
            seed: 99,
            ..SearchConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SearchConfig::load(&path).unwrap(), config);
    }
}
