//! OpenAI-compatible chat completions backend.

use crate::backend::GenerationBackend;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SYSTEM_PROMPT: &str = "You are an expert software engineer who improves the performance \
of code. Reply with code in fenced blocks.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<usize>,
    agent: ureq::Agent,
}

impl OpenAiBackend {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature: 0.7,
            max_tokens: None,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    /// Create from environment variables.
    /// Expects: PATCHFORGE_LLM_API_KEY; optional PATCHFORGE_LLM_ENDPOINT, PATCHFORGE_LLM_MODEL
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("PATCHFORGE_LLM_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let api_key = std::env::var("PATCHFORGE_LLM_API_KEY")
            .map_err(|_| anyhow!("PATCHFORGE_LLM_API_KEY not set"))?;
        let model =
            std::env::var("PATCHFORGE_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        Ok(Self::new(base_url, api_key, model))
    }

    /// Self-hosted endpoint: the API key is optional.
    pub fn from_env_at(base_url: &str) -> Self {
        let api_key = std::env::var("PATCHFORGE_LLM_API_KEY").unwrap_or_default();
        let model =
            std::env::var("PATCHFORGE_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Self::new(base_url.to_string(), api_key, model)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Bound every request. Without this a call blocks until the server answers.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::AgentBuilder::new().timeout(timeout).build();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn test_reachable(&self) -> bool {
        let response = self
            .agent
            .get(&format!("{}/models", self.base_url))
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .call();
        match response {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, endpoint = %self.base_url, "generation endpoint unreachable");
                false
            }
        }
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let start = Instant::now();
        let response = self
            .agent
            .post(&format!("{}/chat/completions", self.base_url))
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_json(&request)
            .map_err(|e| anyhow!("chat completion request failed: {}", e))?;

        let body: ChatResponse = response
            .into_json()
            .map_err(|e| anyhow!("failed to parse chat completion response: {}", e))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("no content in chat completion response"))?;

        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            chars = content.len(),
            "chat completion received"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.2,
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"], "hi");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"```java\nx++;\n```"},"finish_reason":"stop"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("```java\nx++;\n```")
        );
    }

    #[test]
    fn test_base_url_is_normalized() {
        let backend = OpenAiBackend::new("http://localhost:8000/v1/".into(), "k".into(), "m".into());
        assert_eq!(backend.base_url, "http://localhost:8000/v1");
    }
}
