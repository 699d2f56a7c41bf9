// Embeddings module
// Text segmentation, the embedding capability and its Ollama-backed implementation

pub mod chunking;
pub mod hashing;
pub mod lazy;
pub mod ollama;


use async_trait::async_trait;

use crate::{Result, SynapseError};

pub use chunking::{Chunk, ChunkingConfig, chunk_pages, split_text};
pub use hashing::HashingEmbedder;
pub use lazy::LazyEmbeddingProvider;
pub use ollama::{OllamaClient, OllamaEmbedder};

/// A fixed-dimension vector representing a piece of text
pub type Embedding = Vec<f32>;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for a fixed model configuration and must
/// report an unreachable or unloadable model as [`SynapseError::ProviderUnavailable`]
/// rather than returning empty vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in the same order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                SynapseError::ProviderUnavailable(format!(
                    "embedding model '{}' returned no vector",
                    self.model_name()
                ))
            })
    }

    /// Length of every vector this provider produces
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model
    fn model_name(&self) -> &str;
}

/// Fail fast when a provider hands back vectors of the wrong size
#[inline]
pub fn ensure_dimension(embeddings: &[Embedding], expected: usize) -> Result<()> {
    match embeddings.iter().find(|e| e.len() != expected) {
        Some(bad) => Err(SynapseError::DimensionMismatch {
            expected,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}
