//! Backend selection.

use crate::backend::GenerationBackend;
use crate::ollama::{OllamaBackend, DEFAULT_OLLAMA_HOST};
use crate::openai::OpenAiBackend;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    OpenAi,
    Ollama,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Ollama => "ollama",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "ollama" => Ok(BackendKind::Ollama),
            other => Err(format!("unknown generation backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Overrides the backend's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Base URL (OpenAI) or host (Ollama).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl BackendConfig {
    /// Construct the configured backend. Credentials for hosted backends are
    /// read from the environment.
    pub fn build(&self) -> Result<Box<dyn GenerationBackend>> {
        let timeout = self.timeout_secs.map(Duration::from_secs);
        let backend: Box<dyn GenerationBackend> = match self.kind {
            BackendKind::OpenAi => {
                let mut backend = match &self.endpoint {
                    Some(endpoint) => OpenAiBackend::from_env_at(endpoint),
                    None => OpenAiBackend::from_env()?,
                };
                if let Some(model) = &self.model {
                    backend = backend.with_model(model.clone());
                }
                if let Some(temperature) = self.temperature {
                    backend = backend.with_temperature(temperature);
                }
                if let Some(timeout) = timeout {
                    backend = backend.with_timeout(timeout);
                }
                Box::new(backend)
            }
            BackendKind::Ollama => {
                let Some(model) = &self.model else {
                    bail!("the ollama backend needs a model name");
                };
                let host = self.endpoint.as_deref().unwrap_or(DEFAULT_OLLAMA_HOST);
                let mut backend = OllamaBackend::new(host, model.clone());
                if let Some(timeout) = timeout {
                    backend = backend.with_timeout(timeout);
                }
                Box::new(backend)
            }
        };
        info!(backend = backend.name(), "generation backend selected");
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("OpenAI".parse::<BackendKind>(), Ok(BackendKind::OpenAi));
        assert_eq!("ollama".parse::<BackendKind>(), Ok(BackendKind::Ollama));
        assert!("gemini".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_ollama_requires_model() {
        let config = BackendConfig {
            kind: BackendKind::Ollama,
            ..BackendConfig::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_config_deserialization() {
        let config: BackendConfig =
            serde_json::from_str(r#"{"kind":"ollama","model":"codellama:7b"}"#).unwrap();
        assert_eq!(config.kind, BackendKind::Ollama);
        assert_eq!(config.model.as_deref(), Some("codellama:7b"));
        assert!(config.build().is_ok());
    }
}
