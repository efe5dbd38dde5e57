// Exact vector index
// Flat L2 search over f32 vectors with id-keyed metadata persisted next to it


pub mod index;
mod storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use index::VectorIndex;

pub const INDEX_FILE_NAME: &str = "index.bin";
pub const METADATA_FILE_NAME: &str = "metadata.json";

const NO_CONTENT: &str = "No content found";
const UNKNOWN_SOURCE: &str = "unknown";

/// Metadata written by the ingestion pipeline for every chunk vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub source: String,
    pub source_type: String,
    pub chunk_index: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_text: Option<String>,
    /// Fallback text for records written by other tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Metadata attached to one vector.
///
/// Records written by ingestion decode as [`VectorMetadata::Chunk`]; any other
/// JSON object is kept as [`VectorMetadata::Freeform`] and any other JSON value
/// as [`VectorMetadata::Opaque`], so a hand-edited file never fails to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VectorMetadata {
    Chunk(ChunkMetadata),
    Freeform(Map<String, Value>),
    Opaque(Value),
}

impl VectorMetadata {
    /// First non-empty of `chunk_text` and `text`, else a placeholder
    #[inline]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Chunk(chunk) => non_empty(chunk.chunk_text.as_deref())
                .or_else(|| non_empty(chunk.text.as_deref()))
                .unwrap_or(NO_CONTENT),
            Self::Freeform(map) => non_empty(string_field(map, "chunk_text"))
                .or_else(|| non_empty(string_field(map, "text")))
                .unwrap_or(NO_CONTENT),
            Self::Opaque(_) => NO_CONTENT,
        }
    }

    #[inline]
    pub fn source(&self) -> &str {
        match self {
            Self::Chunk(chunk) => &chunk.source,
            Self::Freeform(map) => string_field(map, "source").unwrap_or(UNKNOWN_SOURCE),
            Self::Opaque(_) => UNKNOWN_SOURCE,
        }
    }

    /// Owning document, when the record came from ingestion
    #[inline]
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::Chunk(chunk) => Some(&chunk.document_id),
            Self::Freeform(map) => string_field(map, "document_id"),
            Self::Opaque(_) => None,
        }
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

fn string_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// One nearest-neighbour match
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: u64,
    /// Squared Euclidean distance to the query
    pub score: f32,
    pub metadata: VectorMetadata,
}
