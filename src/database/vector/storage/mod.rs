
use bincode::config::standard as bincode_config;
use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{INDEX_FILE_NAME, METADATA_FILE_NAME, VectorMetadata};
use crate::{BrainError, Result};

const FORMAT_VERSION: u32 = 1;

/// Vectors stored back to back, plus metadata keyed by position
#[derive(Debug, Default, Clone, PartialEq)]
pub(super) struct IndexState {
    pub values: Vec<f32>,
    pub metadata: BTreeMap<u64, VectorMetadata>,
}

impl IndexState {
    pub fn len(&self, dimension: usize) -> usize {
        self.values.len() / dimension
    }

    pub fn vector(&self, dimension: usize, id: usize) -> &[f32] {
        &self.values[id * dimension..(id + 1) * dimension]
    }

    /// Drop everything from `len` on
    pub fn truncate(&mut self, dimension: usize, len: usize) {
        self.values.truncate(len * dimension);
        self.metadata.retain(|id, _| *id < len as u64);
    }
}

#[derive(Debug, Encode, Decode)]
struct StoredIndex {
    version: u32,
    dimension: u64,
    values: Vec<f32>,
}

/// Serialized form of both files, produced under the index lock
#[derive(Debug)]
pub(super) struct EncodedIndex {
    index: Vec<u8>,
    metadata: Vec<u8>,
}

pub(super) fn encode(state: &IndexState, dimension: usize) -> Result<EncodedIndex> {
    let stored = StoredIndex {
        version: FORMAT_VERSION,
        dimension: dimension as u64,
        values: state.values.clone(),
    };
    let index = encode_to_vec(&stored, bincode_config())
        .map_err(|e| BrainError::Persistence(format!("Failed to encode vector index: {e}")))?;
    let metadata = serde_json::to_vec(&state.metadata)
        .map_err(|e| BrainError::Persistence(format!("Failed to encode vector metadata: {e}")))?;

    Ok(EncodedIndex { index, metadata })
}

/// Replace both files. Vectors are written first, so a crash in between leaves
/// `index.bin` longer than `metadata.json`, which [`load_or_create`] repairs.
pub(super) fn write(dir: &Path, encoded: &EncodedIndex) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        BrainError::Persistence(format!(
            "Failed to create vector index directory {}: {e}",
            dir.display()
        ))
    })?;

    replace_file(&dir.join(INDEX_FILE_NAME), &encoded.index)?;
    replace_file(&dir.join(METADATA_FILE_NAME), &encoded.metadata)?;
    sync_dir(dir);

    debug!(
        "Persisted vector index ({} + {} bytes) to {}",
        encoded.index.len(),
        encoded.metadata.len(),
        dir.display()
    );
    Ok(())
}

fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let persist_err =
        |e: std::io::Error| BrainError::Persistence(format!("Failed to write {}: {e}", path.display()));

    let mut file = File::create(&tmp_path).map_err(persist_err)?;
    file.write_all(bytes).map_err(persist_err)?;
    file.sync_all().map_err(persist_err)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(persist_err)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        warn!("Failed to sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Load the index in `dir`, or create an empty one when either file is missing
pub(super) fn load_or_create(dir: &Path, dimension: usize) -> Result<IndexState> {
    let index_path = dir.join(INDEX_FILE_NAME);
    let metadata_path = dir.join(METADATA_FILE_NAME);

    match (index_path.exists(), metadata_path.exists()) {
        (true, true) => {}
        (false, false) => {
            info!("Creating empty vector index at {}", dir.display());
            let state = IndexState::default();
            write(dir, &encode(&state, dimension)?)?;
            return Ok(state);
        }
        (index_exists, _) => {
            let missing = if index_exists {
                &metadata_path
            } else {
                &index_path
            };
            warn!(
                "Vector index file {} is missing, starting with an empty index",
                missing.display()
            );
            let state = IndexState::default();
            write(dir, &encode(&state, dimension)?)?;
            return Ok(state);
        }
    }

    let bytes = fs::read(&index_path).map_err(|e| {
        BrainError::Persistence(format!("Failed to read {}: {e}", index_path.display()))
    })?;
    let (stored, _): (StoredIndex, usize) = decode_from_slice(&bytes, bincode_config())
        .map_err(|e| {
            BrainError::Persistence(format!("Failed to decode {}: {e}", index_path.display()))
        })?;

    if stored.version != FORMAT_VERSION {
        return Err(BrainError::Persistence(format!(
            "Unsupported vector index version {} (expected {})",
            stored.version, FORMAT_VERSION
        )));
    }
    if stored.dimension != dimension as u64 {
        return Err(BrainError::Persistence(format!(
            "Stored vector dimension {} does not match configured dimension {}",
            stored.dimension, dimension
        )));
    }
    if stored.values.len() % dimension != 0 {
        return Err(BrainError::Persistence(format!(
            "{} holds {} floats, not a multiple of dimension {}",
            index_path.display(),
            stored.values.len(),
            dimension
        )));
    }

    let metadata_bytes = fs::read(&metadata_path).map_err(|e| {
        BrainError::Persistence(format!("Failed to read {}: {e}", metadata_path.display()))
    })?;
    let metadata: BTreeMap<u64, VectorMetadata> = serde_json::from_slice(&metadata_bytes)
        .map_err(|e| {
            BrainError::Persistence(format!("Failed to decode {}: {e}", metadata_path.display()))
        })?;

    let mut state = IndexState {
        values: stored.values,
        metadata,
    };

    let vector_count = state.len(dimension);
    // keys must be exactly 0..n; anything after the first gap is unusable
    let metadata_prefix = state
        .metadata
        .keys()
        .enumerate()
        .take_while(|(position, id)| *position as u64 == **id)
        .count();
    let common = vector_count.min(metadata_prefix);

    if common != vector_count || common != state.metadata.len() {
        warn!(
            "Vector index holds {} vectors and {} metadata entries; truncating both to {}",
            vector_count,
            state.metadata.len(),
            common
        );
        state.truncate(dimension, common);
        write(dir, &encode(&state, dimension)?)?;
    }

    info!(
        "Loaded vector index with {} vectors from {}",
        common,
        dir.display()
    );
    Ok(state)
}
