// Embeddings module
// Word-window chunking and the providers that turn chunks into vectors

pub mod chunking;
pub mod remote;


use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, EmbeddingBackend};

pub use chunking::{ChunkingConfig, chunk_text, estimate_token_count};
pub use remote::RemoteEmbedder;

/// Maps text to fixed-dimension vectors, one per input, in input order
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, batch: Vec<String>) -> crate::Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

/// Offline provider producing all-zero vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroEmbedder {
    dimension: usize,
}

impl ZeroEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for ZeroEmbedder {
    async fn embed(&self, batch: Vec<String>) -> crate::Result<Vec<Vec<f32>>> {
        Ok(vec![vec![0.0; self.dimension]; batch.len()])
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Build the provider selected by `embedding.backend`
#[inline]
pub fn provider_from_config(config: &Config) -> crate::Result<Arc<dyn EmbeddingProvider>> {
    let dimension = config.embedding.dimension;
    match config.embedding.backend {
        EmbeddingBackend::Remote => {
            let embedder = RemoteEmbedder::from_config(config)?;
            info!(
                "Using remote embeddings: {} at {}",
                config.embedding.model, config.provider.base_url
            );
            Ok(Arc::new(embedder))
        }
        EmbeddingBackend::Zero => {
            info!("Using zero embeddings (dimension {})", dimension);
            Ok(Arc::new(ZeroEmbedder::new(dimension)))
        }
    }
}
