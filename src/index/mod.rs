// Vector index module
// Persistent nearest-neighbour storage for embedded chunks

pub mod lancedb;
pub mod memory;


use async_trait::async_trait;

use crate::Result;
use crate::embeddings::{Chunk, Embedding};

pub use self::lancedb::LanceIndex;
pub use memory::MemoryIndex;

/// Number of hits returned when the caller does not ask for a specific count
pub const DEFAULT_TOP_K: usize = 4;

/// A chunk returned by a nearest-neighbour search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine similarity to the query, 1.0 for an identical direction
    pub score: f32,
}

/// Stores chunk vectors and answers nearest-neighbour queries.
///
/// Hits are ordered best-first; equal scores keep insertion order. Searching an
/// empty index yields no hits rather than an error.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append entries. Inserting the same chunk twice stores it twice.
    async fn insert_many(&self, entries: &[(Chunk, Embedding)]) -> Result<()>;

    /// Return up to `k` entries most similar to `query`
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Number of stored entries
    async fn count(&self) -> Result<usize>;

    /// Vector length every entry and query must have
    fn dimension(&self) -> usize;
}

/// Cosine similarity in [-1, 1]; zero vectors are dissimilar to everything
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
