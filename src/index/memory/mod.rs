#[cfg(test)]
mod tests;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{SearchHit, VectorIndex, cosine_similarity};
use crate::embeddings::{Chunk, Embedding, ensure_dimension};
use crate::{Result, SynapseError};

/// Brute-force cosine index held in process memory.
///
/// Same contract as the persistent index minus durability. Handy for tests and
/// one-off runs over small documents.
#[derive(Debug)]
pub struct MemoryIndex {
    dimension: usize,
    entries: RwLock<Vec<(Chunk, Embedding)>>,
}

impl MemoryIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn insert_many(&self, entries: &[(Chunk, Embedding)]) -> Result<()> {
        let vectors: Vec<Embedding> = entries.iter().map(|(_, v)| v.clone()).collect();
        ensure_dimension(&vectors, self.dimension)?;

        self.entries.write().await.extend_from_slice(entries);
        debug!("Inserted {} entries into memory index", entries.len());
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(SynapseError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let entries = self.entries.read().await;
        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|(chunk, vector)| SearchHit {
                chunk: chunk.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
