//! Deterministic backend that replays canned responses.
//!
//! Used for offline runs and tests. Clones share the same script and prompt
//! log, so a caller can hand one clone to the search and inspect the other.

use crate::backend::GenerationBackend;
use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<String>,
    fallback: Option<String>,
    prompts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = Script {
            responses: responses.into_iter().map(Into::into).collect(),
            ..Script::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Response returned once the queue runs dry. Without one, an exhausted
    /// script makes `generate` fail.
    pub fn with_fallback(self, fallback: impl Into<String>) -> Self {
        self.lock().fallback = Some(fallback.into());
        self
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.lock().responses.push_back(response.into());
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    pub fn calls(&self) -> usize {
        self.lock().prompts.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn test_reachable(&self) -> bool {
        true
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let mut script = self.lock();
        script.prompts.push(prompt.to_string());
        match script.responses.pop_front() {
            Some(response) => Ok(response),
            None => match &script.fallback {
                Some(fallback) => Ok(fallback.clone()),
                None => bail!("scripted backend has no responses left"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_in_order_and_records_prompts() {
        let backend = ScriptedBackend::new(["one", "two"]);
        let observer = backend.clone();

        assert_eq!(backend.generate("p1").unwrap(), "one");
        assert_eq!(backend.generate("p2").unwrap(), "two");
        assert!(backend.generate("p3").is_err());

        assert_eq!(observer.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_fallback_after_exhaustion() {
        let backend = ScriptedBackend::new(Vec::<String>::new()).with_fallback("none");
        assert_eq!(backend.generate("p").unwrap(), "none");
        assert_eq!(backend.calls(), 1);
    }
}
