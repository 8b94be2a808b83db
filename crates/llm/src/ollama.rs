//! Local Ollama server backend.

use crate::backend::GenerationBackend;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaBackend {
    host: String,
    model: String,
    agent: ureq::Agent,
}

impl OllamaBackend {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        let host: String = host.into();
        Self {
            host: host.trim_end_matches('/').to_string(),
            model: model.into(),
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::AgentBuilder::new().timeout(timeout).build();
        self
    }
}

impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn test_reachable(&self) -> bool {
        match self.agent.get(&format!("{}/api/tags", self.host)).call() {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, host = %self.host, "ollama server unreachable");
                false
            }
        }
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let response = self
            .agent
            .post(&format!("{}/api/generate", self.host))
            .send_json(&request)
            .map_err(|e| anyhow!("ollama request failed: {}", e))?;
        let body: GenerateResponse = response
            .into_json()
            .map_err(|e| anyhow!("failed to parse ollama response: {}", e))?;
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_is_not_streamed() {
        let request = GenerateRequest {
            model: "codellama",
            prompt: "p",
            stream: false,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"stream\":false"));
    }
}
