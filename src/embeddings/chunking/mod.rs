
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ValidationError;

/// Word-window chunking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per window
    pub window_size: usize,
    /// Words shared by adjacent windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            window_size: 400,
            overlap: 80,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.window_size == 0 || self.overlap >= self.window_size {
            return Err(ValidationError::InvalidChunking {
                window_size: self.window_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ValidationError> {
        chunk_text(text, self.window_size, self.overlap)
    }
}

/// Split `text` on whitespace and emit windows of `window_size` words,
/// each starting `window_size - overlap` words after the previous one.
///
/// The last window may be short. Once a window reaches the final word no
/// further windows are produced, so the output never ends with a window that
/// is entirely contained in its predecessor.
#[inline]
pub fn chunk_text(
    text: &str,
    window_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ValidationError> {
    ChunkingConfig {
        window_size,
        overlap,
    }
    .validate()?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let stride = window_size - overlap;

    let mut chunks = Vec::with_capacity(words.len().div_ceil(stride));
    let mut start = 0;
    while start < words.len() {
        let end = (start + window_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }

    debug!(
        "Chunked {} words into {} windows (size {}, overlap {})",
        words.len(),
        chunks.len(),
        window_size,
        overlap
    );

    Ok(chunks)
}

/// Rough token estimate used for logging and progress display
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
