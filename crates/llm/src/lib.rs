//! Generation backends for PatchForge.
//!
//! The search only sees [`GenerationBackend`]: one blocking `generate` call per
//! proposed edit. Which backend sits behind it is decided once, at startup,
//! from a [`BackendConfig`].

pub mod backend;
pub mod config;
pub mod ollama;
pub mod openai;
pub mod scripted;

pub use backend::GenerationBackend;
pub use config::{BackendConfig, BackendKind};
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use scripted::ScriptedBackend;
