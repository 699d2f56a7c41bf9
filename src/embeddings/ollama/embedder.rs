use async_trait::async_trait;
use tokio::task;
use tracing::{debug, info};

use super::OllamaClient;
use crate::embeddings::{Embedding, EmbeddingProvider, ensure_dimension};
use crate::{Result, SynapseError};

/// Embedding provider backed by an Ollama embedding model
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    dimension: usize,
}

impl OllamaEmbedder {
    /// Connect to the server and make sure the model is present and produces
    /// `dimension`-sized vectors.
    ///
    /// This is the expensive "model load" step; wrap the result in a
    /// [`LazyEmbeddingProvider`](crate::embeddings::LazyEmbeddingProvider) to run it
    /// once per process.
    #[inline]
    pub async fn connect(client: OllamaClient, dimension: usize) -> Result<Self> {
        let probe_client = client.clone();
        let probe = task::spawn_blocking(move || {
            probe_client.health_check()?;
            probe_client.generate_embedding("dimension probe")
        })
        .await
        .map_err(|e| SynapseError::ProviderUnavailable(format!("model load task failed: {}", e)))?
        .map_err(|e| {
            SynapseError::ProviderUnavailable(format!(
                "embedding model '{}' could not be loaded: {:#}",
                client.embedding_model(),
                e
            ))
        })?;

        if probe.len() != dimension {
            return Err(SynapseError::DimensionMismatch {
                expected: dimension,
                actual: probe.len(),
            });
        }

        info!(
            "Connected to embedding model '{}' ({} dimensions)",
            client.embedding_model(),
            dimension
        );

        Ok(Self { client, dimension })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding {} texts with {}", texts.len(), self.model_name());

        let client = self.client.clone();
        let texts = texts.to_vec();
        let embeddings = task::spawn_blocking(move || client.generate_embeddings_batch(&texts))
            .await
            .map_err(|e| SynapseError::ProviderUnavailable(format!("embedding task failed: {}", e)))?
            .map_err(|e| {
                SynapseError::ProviderUnavailable(format!(
                    "embedding with '{}' failed: {:#}",
                    self.client.embedding_model(),
                    e
                ))
            })?;

        ensure_dimension(&embeddings, self.dimension)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        self.client.embedding_model()
    }
}
