use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::document::DocumentParser;
use crate::embeddings::{ChunkingConfig, Embedding, EmbeddingProvider, chunk_pages};
use crate::index::VectorIndex;
use crate::{Result, SynapseError};

/// Summary of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Identifier stored with every chunk of the document
    pub source: String,
    pub pages: usize,
    pub chunks: usize,
}

/// Turns a document on disk into searchable index entries
pub struct IngestionPipeline {
    parser: Arc<dyn DocumentParser>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            parser,
            embedder,
            index,
            chunking,
        }
    }

    /// Ingest the document at `path`, using the path itself as the source identifier
    #[inline]
    pub async fn ingest(&self, path: &Path) -> Result<IngestReport> {
        self.ingest_named(path, &path.display().to_string()).await
    }

    /// Ingest the document at `path`, recording `source` as its identifier.
    ///
    /// Embedding happens in one batch and the index write in one call. A failure in
    /// either step is returned to the caller; entries already written are not rolled
    /// back.
    #[inline]
    pub async fn ingest_named(&self, path: &Path, source: &str) -> Result<IngestReport> {
        if self.embedder.dimension() != self.index.dimension() {
            return Err(SynapseError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: self.embedder.dimension(),
            });
        }

        info!("Ingesting '{}' from {}", source, path.display());

        let pages = self.parser.parse(path).await?;
        let chunks = chunk_pages(source, &pages, &self.chunking);

        if chunks.is_empty() {
            warn!("'{}' produced no text chunks; nothing to index", source);
            return Ok(IngestReport {
                source: source.to_string(),
                pages: pages.len(),
                chunks: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings: Vec<Embedding> = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(SynapseError::ProviderUnavailable(format!(
                "embedding model '{}' returned {} vectors for {} chunks",
                self.embedder.model_name(),
                embeddings.len(),
                chunks.len()
            )));
        }
        debug!("Embedded {} chunks of '{}'", chunks.len(), source);

        let chunk_count = chunks.len();
        let entries: Vec<_> = chunks.into_iter().zip(embeddings).collect();
        self.index.insert_many(&entries).await?;

        info!(
            "Indexed '{}': {} pages, {} chunks",
            source,
            pages.len(),
            chunk_count
        );

        Ok(IngestReport {
            source: source.to_string(),
            pages: pages.len(),
            chunks: chunk_count,
        })
    }
}
