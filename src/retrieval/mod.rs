
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::vector::SearchHit;
use crate::database::vector::index::VectorIndex;
use crate::embeddings::EmbeddingProvider;
use crate::synthesis::CompletionClient;

pub const NO_DATA_ANSWER: &str = "No relevant data found. Please ingest documents first.";

/// One retrieved chunk, ready for display or prompting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub source: String,
    /// Squared L2 distance; lower is closer
    pub score: f32,
}

impl From<SearchHit> for RetrievedContext {
    #[inline]
    fn from(hit: SearchHit) -> Self {
        Self {
            text: hit.metadata.display_text().to_string(),
            source: hit.metadata.source().to_string(),
            score: hit.score,
        }
    }
}

/// Inclusive creation-date window. Accepted but not yet applied to results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub contexts: Vec<RetrievedContext>,
}

#[derive(Clone)]
pub struct Retriever {
    index: VectorIndex,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    #[inline]
    pub fn new(index: VectorIndex, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, provider }
    }

    /// The `top_k` chunks closest to `query`, closest first
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        date_range: Option<DateRange>,
    ) -> Result<Vec<RetrievedContext>> {
        if let Some(range) = date_range {
            debug!(
                "Date range {:?}..{:?} requested; date filtering is not applied",
                range.start, range.end
            );
        }

        let Some(query_vector) = self
            .provider
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
        else {
            warn!("Embedding provider returned no vector for the query");
            return Ok(Vec::new());
        };

        let hits = self
            .index
            .search(&[query_vector], top_k)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        debug!("Retrieved {} contexts for query", hits.len());
        Ok(hits.into_iter().map(RetrievedContext::from).collect())
    }

    /// Retrieve and, when anything matched, synthesize an answer from it
    #[inline]
    pub async fn answer(
        &self,
        query: &str,
        top_k: usize,
        completion: &CompletionClient,
    ) -> Result<Answer> {
        let contexts = self.retrieve(query, top_k, None).await?;
        if contexts.is_empty() {
            info!("No contexts matched; returning the no-data answer");
            return Ok(Answer {
                answer: NO_DATA_ANSWER.to_string(),
                contexts,
            });
        }

        let answer = completion.synthesize(query, &contexts).await?;
        Ok(Answer { answer, contexts })
    }
}
