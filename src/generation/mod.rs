// Generation module
// The text-generation capability used to compose answers


use async_trait::async_trait;
use tokio::task;
use tracing::debug;

use crate::embeddings::OllamaClient;
use crate::{Result, SynapseError};

/// Produces a completion for a prompt.
///
/// Implementations should be deterministic (temperature 0) so the same prompt
/// yields the same answer.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Generative model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
}

impl OllamaGenerator {
    #[inline]
    pub const fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GenerativeModel for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Requesting completion from {}", self.model_name());

        let client = self.client.clone();
        let prompt = prompt.to_string();
        task::spawn_blocking(move || client.generate_completion(&prompt))
            .await
            .map_err(|e| SynapseError::ProviderUnavailable(format!("generation task failed: {}", e)))?
            .map_err(|e| {
                SynapseError::ProviderUnavailable(format!(
                    "generative model '{}' failed: {:#}",
                    self.model_name(),
                    e
                ))
            })
    }

    fn model_name(&self) -> &str {
        self.client.generation_model()
    }
}
