//! Backend trait.

use anyhow::Result;

/// A text-generation service.
///
/// Calls are synchronous. Implementations perform no retries; a failed call is
/// reported to the caller, which decides what a missing answer means.
pub trait GenerationBackend: Send + Sync {
    /// Name of this backend, for logs.
    fn name(&self) -> &str;

    /// Cheap liveness probe.
    fn test_reachable(&self) -> bool;

    /// Send one prompt and return the raw response text.
    fn generate(&self, prompt: &str) -> Result<String>;
}

impl<B: GenerationBackend + ?Sized> GenerationBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn test_reachable(&self) -> bool {
        (**self).test_reachable()
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }
}
