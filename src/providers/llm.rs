//! LLM client trait for answer generation

use async_trait::async_trait;

use crate::error::Result;

/// Trait for language-model answer generation
///
/// Implementations:
/// - `OllamaLlm`: local Ollama server (`/api/generate`)
/// - `OpenAiClient`: OpenAI-compatible chat-completions API
#[async_trait]
pub trait LlmClient: Send + Sync + std::fmt::Debug {
    /// Generate a completion for a fully assembled prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Maximum prompt size this provider accepts, in characters
    fn max_input_chars(&self) -> usize;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// The model being used
    fn model(&self) -> &str;
}
