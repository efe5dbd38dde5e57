
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, Type};

pub type MetadataMap = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub source: String,
    pub source_type: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub metadata: Json<MetadataMap>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Indexed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Pending => write!(f, "Pending"),
            DocumentStatus::Indexed => write!(f, "Indexed"),
            DocumentStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub source: String,
    pub source_type: String,
    pub metadata: MetadataMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub embedding_id: Option<i64>,
    pub metadata: Json<MetadataMap>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewChunk {
    pub text: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub embedding_id: Option<i64>,
    pub metadata: MetadataMap,
}

impl Document {
    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.status == DocumentStatus::Indexed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.status == DocumentStatus::Failed
    }
}
