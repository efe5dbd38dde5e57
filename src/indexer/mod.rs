// Indexer module
// Turns raw text into documents, chunks and vectors

pub mod consistency;


use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::database::sqlite::Database;
use crate::database::sqlite::models::{MetadataMap, NewChunk, NewDocument};
use crate::database::vector::index::VectorIndex;
use crate::database::vector::{ChunkMetadata, VectorMetadata};
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::chunking::ChunkingConfig;
use crate::{BrainError, Result, ValidationError, extract};

pub use consistency::{ConsistencyReport, ConsistencyValidator, ConsistencyWarning};

pub const AUDIO_SKIP_REASON: &str = "Audio ingestion not supported (ffmpeg missing)";

/// Kind of content a document was ingested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Md,
    Txt,
    Audio,
    Web,
}

impl SourceType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Md => "md",
            Self::Txt => "txt",
            Self::Audio => "audio",
            Self::Web => "web",
        }
    }

    /// Whether `ingest_file` can read this type as text
    #[inline]
    pub fn is_text_file(self) -> bool {
        matches!(self, Self::Pdf | Self::Md | Self::Txt)
    }
}

impl fmt::Display for SourceType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ValidationError;

    #[inline]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "md" | "markdown" => Ok(Self::Md),
            "txt" | "text" => Ok(Self::Txt),
            "audio" => Ok(Self::Audio),
            "web" | "url" => Ok(Self::Web),
            _ => Err(ValidationError::UnsupportedSourceType(s.to_string())),
        }
    }
}

/// Raw text to ingest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestRequest {
    pub text: String,
    /// File path, URL or any other identifier shown next to results
    pub source: String,
    pub source_type: String,
    pub title: Option<String>,
    pub metadata: MetadataMap,
}

impl IngestRequest {
    #[inline]
    pub fn new(
        text: impl Into<String>,
        source: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            source_type: source_type.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }
}

/// Result of one ingestion call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    Ok {
        document_id: String,
        chunk_count: usize,
    },
    Empty,
    Skipped {
        reason: String,
    },
}

/// Ingestion pipeline: chunk, record the document, embed, index, record chunks
#[derive(Clone)]
pub struct Ingestor {
    database: Database,
    index: VectorIndex,
    provider: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    #[inline]
    pub fn new(
        database: Database,
        index: VectorIndex,
        provider: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            database,
            index,
            provider,
            chunking,
        }
    }

    /// Ingest raw text.
    ///
    /// Nothing is written when the source type is unknown, the text is blank
    /// or the chunking policy is invalid. Once the document row exists, a
    /// failure marks it `failed` so the repair path can remove it.
    #[inline]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let source_type: SourceType = request.source_type.parse()?;
        if source_type == SourceType::Audio {
            info!("Skipping audio source {}", request.source);
            return Ok(IngestOutcome::Skipped {
                reason: AUDIO_SKIP_REASON.to_string(),
            });
        }

        if request.text.trim().is_empty() {
            debug!("Nothing to ingest from {}", request.source);
            return Ok(IngestOutcome::Empty);
        }

        let chunks = self.chunking.chunk(&request.text)?;
        debug!("Split {} into {} chunks", request.source, chunks.len());

        let title = request
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| request.source.clone());
        let document = self
            .database
            .create_document(NewDocument {
                title,
                source: request.source.clone(),
                source_type: source_type.to_string(),
                metadata: request.metadata,
            })
            .await
            .map_err(database_error)?;

        match self
            .index_chunks(&document.id, &request.source, source_type, chunks)
            .await
        {
            Ok(chunk_count) => {
                info!(
                    "Ingested {} as document {} ({} chunks)",
                    request.source, document.id, chunk_count
                );
                Ok(IngestOutcome::Ok {
                    document_id: document.id,
                    chunk_count,
                })
            }
            Err(e) => {
                error!("Ingestion of {} failed: {}", request.source, e);
                if let Err(mark_err) = self
                    .database
                    .mark_document_failed(&document.id, &e.to_string())
                    .await
                {
                    warn!(
                        "Could not mark document {} as failed: {:#}",
                        document.id, mark_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn index_chunks(
        &self,
        document_id: &str,
        source: &str,
        source_type: SourceType,
        chunks: Vec<String>,
    ) -> Result<usize> {
        let vectors = self.provider.embed(chunks.clone()).await?;

        let created_at = Utc::now();
        let metadatas: Vec<ChunkMetadata> = chunks
            .iter()
            .enumerate()
            .map(|(chunk_index, text)| ChunkMetadata {
                document_id: document_id.to_string(),
                source: source.to_string(),
                source_type: source_type.to_string(),
                chunk_index: chunk_index as u32,
                created_at,
                chunk_text: Some(text.clone()),
                text: None,
            })
            .collect();

        let ids = self
            .index
            .add(
                vectors,
                metadatas.iter().cloned().map(VectorMetadata::Chunk).collect(),
            )
            .await?;

        let new_chunks = chunks
            .into_iter()
            .zip(ids)
            .zip(&metadatas)
            .map(|((text, id), metadata)| {
                Ok(NewChunk {
                    text,
                    embedding_id: Some(id as i64),
                    metadata: metadata_map(metadata)?,
                    ..NewChunk::default()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let stored = self
            .database
            .insert_chunks(document_id, new_chunks)
            .await
            .map_err(database_error)?;
        Ok(stored.len())
    }

    /// Read a local file as text and ingest it
    #[inline]
    pub async fn ingest_file(
        &self,
        path: &Path,
        source_type: &str,
        title: Option<String>,
    ) -> Result<IngestOutcome> {
        let parsed: SourceType = source_type.parse()?;
        if parsed == SourceType::Audio {
            info!("Skipping audio file {}", path.display());
            return Ok(IngestOutcome::Skipped {
                reason: AUDIO_SKIP_REASON.to_string(),
            });
        }
        if !parsed.is_text_file() {
            return Err(ValidationError::UnsupportedSourceType(source_type.to_string()).into());
        }

        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        debug!("Read {} bytes from {}", bytes.len(), path.display());

        self.ingest(
            IngestRequest::new(text, path.display().to_string(), parsed.as_str())
                .with_title(title),
        )
        .await
    }

    /// Fetch a web page, extract its readable text and ingest it
    #[inline]
    pub async fn ingest_url(&self, url: &str) -> Result<IngestOutcome> {
        let target = url.to_string();
        let page = tokio::task::spawn_blocking(move || extract::fetch_page(&target))
            .await
            .map_err(|e| BrainError::Other(anyhow::anyhow!("fetch task failed: {e}")))??;

        self.ingest(
            IngestRequest::new(page.text, url, SourceType::Web.as_str()).with_title(page.title),
        )
        .await
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

fn metadata_map(metadata: &ChunkMetadata) -> Result<MetadataMap> {
    match serde_json::to_value(metadata).map_err(|e| BrainError::Other(e.into()))? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(BrainError::Other(anyhow::anyhow!(
            "chunk metadata serialized to {other}"
        ))),
    }
}

pub(crate) fn database_error(e: anyhow::Error) -> BrainError {
    BrainError::Database(format!("{e:#}"))
}
