use async_trait::async_trait;

use super::{Embedding, EmbeddingProvider};
use crate::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic bag-of-words embedder.
///
/// Lowercased alphanumeric tokens are hashed (FNV-1a) into `dimension` buckets and
/// the counts are L2-normalised, so texts sharing vocabulary score high under cosine
/// similarity. Needs no model server, which makes it suitable for tests and offline use.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed synchronously; the async trait methods delegate here
    #[inline]
    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0_f32; self.dimension];
        let mut seen_token = false;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            seen_token = true;
            vector[self.bucket(&token.to_lowercase())] += 1.0;
        }

        // Punctuation-only text still needs a non-zero direction
        if !seen_token {
            let trimmed = text.trim();
            let bucket = if trimmed.is_empty() {
                0
            } else {
                self.bucket(trimmed)
            };
            vector[bucket] = 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        for value in &mut vector {
            *value /= norm;
        }
        vector
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = token.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        });
        (hash % self.dimension as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashing"
    }
}
