use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skein_core::Result;

/// Sampling parameters sent alongside a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// How many completions the service should produce.
    pub number_of_responses: u32,
    pub stop_sequences: Vec<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            max_tokens: 256,
            number_of_responses: 1,
            stop_sequences: vec![],
        }
    }
}

/// Trait implemented by each text-completion backend (OpenAI, Azure, mocks, …).
///
/// Implementations own their transport concerns, timeouts included. A timeout
/// surfaces as an ordinary `SkeinError::Service`.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Human-readable backend name, e.g. "openai", "azure".
    fn name(&self) -> &str;

    /// Turn a prompt into generated text.
    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String>;
}
