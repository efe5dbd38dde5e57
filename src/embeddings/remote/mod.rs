#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::provider::ProviderTransport;
use crate::{BrainError, ProviderError};

const EMBEDDINGS_ENDPOINT: &str = "embeddings";

/// OpenAI-style `/embeddings` client
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    transport: ProviderTransport,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    #[inline]
    pub fn new(transport: ProviderTransport, model: String, dimension: usize) -> Self {
        Self {
            transport,
            model,
            dimension,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let transport = ProviderTransport::from_config(&config.provider)?;
        Ok(Self::new(
            transport,
            config.embedding.model.clone(),
            config.embedding.dimension,
        ))
    }

    /// Embed `texts` with a single blocking request
    #[inline]
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} embeddings from {}", texts.len(), self.model);

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbedResponse = self.transport.post_json(EMBEDDINGS_ENDPOINT, &request)?;

        if response.data.len() != texts.len() {
            return Err(ProviderError::status(
                200,
                format!(
                    "requested {} embeddings, received {}",
                    texts.len(),
                    response.data.len()
                ),
            ));
        }

        let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(ProviderError::status(
                200,
                format!(
                    "embedding {} has dimension {}, expected {}",
                    position,
                    vector.len(),
                    self.dimension
                ),
            ));
        }

        debug!("Received {} embeddings", vectors.len());
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedder {
    async fn embed(&self, batch: Vec<String>) -> crate::Result<Vec<Vec<f32>>> {
        let embedder = self.clone();
        tokio::task::spawn_blocking(move || embedder.embed_batch(&batch))
            .await
            .map_err(|e| BrainError::Other(anyhow::anyhow!("embedding task failed: {e}")))?
            .map_err(BrainError::from)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
