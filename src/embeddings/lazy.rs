use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{Embedding, EmbeddingProvider};
use crate::{Result, SynapseError};

type Loader = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn EmbeddingProvider>>> + Send + Sync>;

/// Loads an embedding model on first use and shares it for the rest of the process.
///
/// Concurrent first callers wait on a single initialisation; once loaded the model is
/// never torn down. A failed load is not cached: every call made while the model
/// cannot be loaded fails with [`SynapseError::ProviderUnavailable`] and the next call
/// tries again.
pub struct LazyEmbeddingProvider {
    model_name: String,
    dimension: usize,
    loader: Loader,
    model: OnceCell<Arc<dyn EmbeddingProvider>>,
}

impl std::fmt::Debug for LazyEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEmbeddingProvider")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl LazyEmbeddingProvider {
    /// `dimension` is the size the loaded model is expected to produce
    #[inline]
    pub fn new<F, Fut>(model_name: impl Into<String>, dimension: usize, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn EmbeddingProvider>>> + Send + 'static,
    {
        Self {
            model_name: model_name.into(),
            dimension,
            loader: Box::new(move || loader().boxed()),
            model: OnceCell::new(),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Load the model now instead of on the first embedding request
    #[inline]
    pub async fn warm_up(&self) -> Result<()> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<&Arc<dyn EmbeddingProvider>> {
        self.model
            .get_or_try_init(|| async {
                debug!("Loading embedding model '{}'", self.model_name);
                let model = (self.loader)().await.map_err(|e| match e {
                    e @ (SynapseError::ProviderUnavailable(_)
                    | SynapseError::DimensionMismatch { .. }) => e,
                    other => SynapseError::ProviderUnavailable(format!(
                        "failed to load embedding model '{}': {}",
                        self.model_name, other
                    )),
                })?;

                if model.dimension() != self.dimension {
                    return Err(SynapseError::DimensionMismatch {
                        expected: self.dimension,
                        actual: model.dimension(),
                    });
                }

                info!(
                    "Embedding model '{}' loaded ({} dimensions)",
                    self.model_name, self.dimension
                );
                Ok(model)
            })
            .await
            .inspect_err(|e| warn!("Embedding model '{}' unavailable: {}", self.model_name, e))
    }
}

#[async_trait]
impl EmbeddingProvider for LazyEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.model().await?.embed_batch(texts).await
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.model().await?.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
