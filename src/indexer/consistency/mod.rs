// Consistency validation between the document store and the vector index


use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, error, info, warn};

use super::database_error;
use crate::Result;
use crate::database::sqlite::Database;
use crate::database::vector::index::VectorIndex;

/// Something wrong that does not stop the store from working
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyWarning {
    /// A chunk points at a vector the index does not hold
    DanglingChunk {
        chunk_id: String,
        document_id: String,
        embedding_id: i64,
    },
}

impl fmt::Display for ConsistencyWarning {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingChunk {
                chunk_id,
                document_id,
                embedding_id,
            } => write!(
                f,
                "chunk {} of document {} references missing vector {}",
                chunk_id, document_id, embedding_id
            ),
        }
    }
}

/// Cross-check results for documents, chunks and vectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub documents: usize,
    pub chunks: usize,
    pub vectors: usize,
    /// Documents that are not `indexed` and own no chunks
    pub unindexed_documents: Vec<String>,
    pub dangling_chunks: Vec<ConsistencyWarning>,
    /// Vector ids no chunk references
    pub orphaned_vectors: Vec<u64>,
    pub is_consistent: bool,
}

impl ConsistencyReport {
    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Store is consistent: {} documents, {} chunks, {} vectors",
                self.documents, self.chunks, self.vectors
            )
        } else {
            format!(
                "Store inconsistencies found: {} unindexed documents, {} dangling chunks, {} orphaned vectors",
                self.unindexed_documents.len(),
                self.dangling_chunks.len(),
                self.orphaned_vectors.len()
            )
        }
    }

    #[inline]
    pub fn total_issues(&self) -> usize {
        self.unindexed_documents.len() + self.dangling_chunks.len() + self.orphaned_vectors.len()
    }
}

pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    index: &'a VectorIndex,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(database: &'a Database, index: &'a VectorIndex) -> Self {
        Self { database, index }
    }

    #[inline]
    pub async fn validate_consistency(&self) -> Result<ConsistencyReport> {
        info!("Starting document store consistency validation");

        let documents = self.database.count_documents().await.map_err(database_error)?;
        let unindexed_documents: Vec<String> = self
            .database
            .list_unindexed_documents()
            .await
            .map_err(database_error)?
            .into_iter()
            .map(|d| d.id)
            .collect();
        let chunks = self.database.list_chunks().await.map_err(database_error)?;
        let vector_ids: BTreeSet<u64> = self.index.entries().await.into_keys().collect();
        debug!(
            "Checking {} documents, {} chunks, {} vectors",
            documents,
            chunks.len(),
            vector_ids.len()
        );

        let mut referenced = BTreeSet::new();
        let mut dangling_chunks = Vec::new();
        for chunk in &chunks {
            let Some(embedding_id) = chunk.embedding_id else {
                continue;
            };
            match u64::try_from(embedding_id) {
                Ok(id) if vector_ids.contains(&id) => {
                    referenced.insert(id);
                }
                _ => dangling_chunks.push(ConsistencyWarning::DanglingChunk {
                    chunk_id: chunk.id.clone(),
                    document_id: chunk.document_id.clone(),
                    embedding_id,
                }),
            }
        }

        let orphaned_vectors: Vec<u64> = vector_ids.difference(&referenced).copied().collect();

        let is_consistent = unindexed_documents.is_empty()
            && dangling_chunks.is_empty()
            && orphaned_vectors.is_empty();

        let report = ConsistencyReport {
            documents: documents as usize,
            chunks: chunks.len(),
            vectors: vector_ids.len(),
            unindexed_documents,
            dangling_chunks,
            orphaned_vectors,
            is_consistent,
        };

        if report.is_consistent {
            info!("Consistency validation passed");
        } else {
            warn!("{}", report.summary());
            Self::log_consistency_issues(&report);
        }

        Ok(report)
    }

    /// Delete the unindexed documents listed in `report`.
    ///
    /// Documents that gained chunks since the report was taken are left alone.
    /// Orphaned vectors stay in the index.
    #[inline]
    pub async fn repair(&self, report: &ConsistencyReport) -> Result<usize> {
        if report.unindexed_documents.is_empty() {
            info!("No unindexed documents to remove");
            return Ok(0);
        }

        let mut removed = 0;
        for document_id in &report.unindexed_documents {
            match self.database.delete_document(document_id).await {
                Ok(true) => {
                    removed += 1;
                    debug!("Removed unindexed document {}", document_id);
                }
                Ok(false) => warn!("Unindexed document {} already gone", document_id),
                Err(e) => error!("Failed to remove document {}: {:#}", document_id, e),
            }
        }

        if !report.orphaned_vectors.is_empty() {
            info!(
                "{} orphaned vectors remain in the index",
                report.orphaned_vectors.len()
            );
        }

        info!("Removed {} unindexed documents", removed);
        Ok(removed)
    }

    fn log_consistency_issues(report: &ConsistencyReport) {
        for document_id in &report.unindexed_documents {
            warn!("Document {} was never indexed", document_id);
        }
        for warning in &report.dangling_chunks {
            warn!("{}", warning);
        }
        if !report.orphaned_vectors.is_empty() {
            warn!(
                "Found {} vectors not referenced by any chunk",
                report.orphaned_vectors.len()
            );
        }
    }
}
