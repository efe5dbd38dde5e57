use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrainError>;

#[derive(Error, Debug)]
pub enum BrainError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Input rejected before anything is written
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("text is empty")]
    EmptyText,

    #[error("{0}")]
    DimensionMismatch(DimensionMismatch),

    #[error("unsupported source type: {0}")]
    UnsupportedSourceType(String),

    #[error("invalid chunking parameters: window size {window_size}, overlap {overlap}")]
    InvalidChunking { window_size: usize, overlap: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DimensionMismatch {
    #[error("{vectors} vectors supplied with {metadatas} metadata entries")]
    Count { vectors: usize, metadatas: usize },

    #[error("vector {position} has dimension {actual}, expected {expected}")]
    Vector {
        position: usize,
        expected: usize,
        actual: usize,
    },
}

impl From<DimensionMismatch> for ValidationError {
    #[inline]
    fn from(mismatch: DimensionMismatch) -> Self {
        Self::DimensionMismatch(mismatch)
    }
}

impl From<DimensionMismatch> for BrainError {
    #[inline]
    fn from(mismatch: DimensionMismatch) -> Self {
        Self::Validation(mismatch.into())
    }
}

/// Failure reported by a remote embedding or completion provider.
///
/// `status` is `None` when no HTTP response was received at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", self.describe())]
pub struct ProviderError {
    pub status: Option<u16>,
    pub body: String,
}

impl ProviderError {
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: message.into(),
        }
    }

    #[inline]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
        }
    }

    fn describe(&self) -> String {
        match self.status {
            Some(status) => format!("HTTP {}: {}", status, self.body),
            None => format!("transport failure: {}", self.body),
        }
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod extract;
pub mod indexer;
pub mod provider;
pub mod retrieval;
pub mod synthesis;
