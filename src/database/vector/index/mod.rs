#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::storage::{self, IndexState};
use super::{SearchHit, VectorMetadata};
use crate::{BrainError, DimensionMismatch, Result};

/// Handle to the on-disk vector index.
///
/// Clones share one state. Writers are serialized by the lock and every
/// successful `add` is on disk before it returns. Searches scan an `Arc`
/// snapshot off the runtime, so a writer copies the state only while a scan
/// still holds the old one.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    state: Arc<RwLock<Arc<IndexState>>>,
    dimension: usize,
    dir: Arc<PathBuf>,
}

impl VectorIndex {
    /// Open the index stored in `dir`, creating an empty one if needed
    #[inline]
    pub async fn open(dir: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(BrainError::Persistence(
                "vector dimension must be at least 1".to_string(),
            ));
        }

        let dir = dir.as_ref().to_path_buf();
        let load_dir = dir.clone();
        let state =
            tokio::task::spawn_blocking(move || storage::load_or_create(&load_dir, dimension))
                .await
                .map_err(|e| BrainError::Other(anyhow::anyhow!("index load task failed: {e}")))??;

        Ok(Self {
            state: Arc::new(RwLock::new(Arc::new(state))),
            dimension,
            dir: Arc::new(dir),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub async fn len(&self) -> usize {
        self.state.read().await.len(self.dimension)
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[inline]
    pub async fn metadata(&self, id: u64) -> Option<VectorMetadata> {
        self.state.read().await.metadata.get(&id).cloned()
    }

    /// Snapshot of every id and its metadata
    #[inline]
    pub async fn entries(&self) -> BTreeMap<u64, VectorMetadata> {
        self.state.read().await.metadata.clone()
    }

    /// Append vectors with their metadata and persist both files.
    ///
    /// Ids are consecutive, starting at the number of vectors held before the
    /// call. The write runs on its own task, so it finishes even if the
    /// returned future is dropped.
    #[inline]
    pub async fn add(
        &self,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<VectorMetadata>,
    ) -> Result<Vec<u64>> {
        self.check_batch(&vectors, &metadatas)?;
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.clone();
        tokio::spawn(async move { index.append(vectors, metadatas).await })
            .await
            .map_err(|e| BrainError::Other(anyhow::anyhow!("index write task failed: {e}")))?
    }

    fn check_batch(&self, vectors: &[Vec<f32>], metadatas: &[VectorMetadata]) -> Result<()> {
        if vectors.len() != metadatas.len() {
            return Err(DimensionMismatch::Count {
                vectors: vectors.len(),
                metadatas: metadatas.len(),
            }
            .into());
        }
        self.check_dimensions(vectors)
    }

    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(DimensionMismatch::Vector {
                position,
                expected: self.dimension,
                actual: vector.len(),
            }
            .into());
        }
        Ok(())
    }

    async fn append(
        &self,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<VectorMetadata>,
    ) -> Result<Vec<u64>> {
        let mut guard = self.state.write().await;
        let state = Arc::make_mut(&mut guard);
        let start = state.len(self.dimension);

        let ids: Vec<u64> = (start..start + vectors.len()).map(|id| id as u64).collect();
        state.values.reserve(vectors.len() * self.dimension);
        for (id, (vector, metadata)) in ids.iter().zip(vectors.iter().zip(metadatas)) {
            state.values.extend_from_slice(vector);
            state.metadata.insert(*id, metadata);
        }

        if let Err(e) = self.persist(state).await {
            error!("Failed to persist vector index, rolling back: {}", e);
            state.truncate(self.dimension, start);
            return Err(e);
        }

        info!(
            "Added {} vectors to index (ids {}..{})",
            ids.len(),
            start,
            start + ids.len()
        );
        Ok(ids)
    }

    async fn persist(&self, state: &IndexState) -> Result<()> {
        let encoded = storage::encode(state, self.dimension)?;
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || storage::write(&dir, &encoded))
            .await
            .map_err(|e| BrainError::Persistence(format!("index write task failed: {e}")))?
    }

    /// Exact nearest neighbours for each query, closest first.
    ///
    /// Scores are squared Euclidean distances; equal scores are ordered by id.
    #[inline]
    pub async fn search(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<SearchHit>>> {
        self.check_dimensions(queries)?;

        let snapshot = Arc::clone(&*self.state.read().await);
        let count = snapshot.len(self.dimension);
        if count == 0 || k == 0 {
            return Ok(vec![Vec::new(); queries.len()]);
        }

        let dimension = self.dimension;
        let owned_queries = queries.to_vec();
        let results =
            tokio::task::spawn_blocking(move || rank(&snapshot, dimension, &owned_queries, k))
                .await
                .map_err(|e| BrainError::Other(anyhow::anyhow!("index search task failed: {e}")))?;

        debug!(
            "Searched {} vectors for {} queries (k = {})",
            count,
            queries.len(),
            k
        );
        Ok(results)
    }
}

fn rank(
    state: &IndexState,
    dimension: usize,
    queries: &[Vec<f32>],
    k: usize,
) -> Vec<Vec<SearchHit>> {
    queries
        .iter()
        .map(|query| {
            nearest(state, dimension, query, k)
                .into_iter()
                .filter_map(|(score, id)| match state.metadata.get(&id) {
                    Some(metadata) => Some(SearchHit {
                        id,
                        score,
                        metadata: metadata.clone(),
                    }),
                    None => {
                        warn!("Vector {} has no metadata, skipping", id);
                        None
                    }
                })
                .collect()
        })
        .collect()
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Up to `k` `(distance, id)` pairs in ascending order
fn nearest(state: &IndexState, dimension: usize, query: &[f32], k: usize) -> Vec<(f32, u64)> {
    let mut scored: Vec<(f32, u64)> = (0..state.len(dimension))
        .map(|id| {
            (
                squared_distance(state.vector(dimension, id), query),
                id as u64,
            )
        })
        .collect();

    let by_distance_then_id =
        |a: &(f32, u64), b: &(f32, u64)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));

    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_distance_then_id);
        scored.truncate(k);
    }
    scored.sort_unstable_by(by_distance_then_id);
    scored
}
