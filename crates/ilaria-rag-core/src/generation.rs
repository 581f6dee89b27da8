//! Language model capability.
//!
//! The orchestrator only needs "prompt in, text out". Hosted model clients
//! implement [`Generator`] in the app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Sampling parameters passed with every generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// A text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier reported in answer metadata.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`. Failures are returned as-is;
    /// callers decide whether to surface or degrade.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}
