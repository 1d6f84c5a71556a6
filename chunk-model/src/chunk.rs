//! Document chunk record: the unit stored by the vector/lexical store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::CollectionId;

/// Opaque chunk identifier, a UUID per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(pub Uuid);

impl ChunkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chunk metadata. `source`, `page`, `chunk_size` and `processed_at` are the
/// reserved keys named in the data model; `extra` carries anything else a
/// reader attaches (e.g. a highlighted snippet added by the retriever).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
    pub chunk_size: usize,
    pub processed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ChunkMetadata {
    pub fn new(source: impl Into<String>, page: u32, chunk_size: usize) -> Self {
        Self {
            source: source.into(),
            page,
            chunk_size,
            processed_at: Utc::now(),
            extra: BTreeMap::new(),
        }
    }
}

/// A bounded-size slice of a source document with its own dense and lexical
/// representation. `lexical_vector` is not stored on the in-memory record:
/// it is derived by the store from `content` at insert time (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub collection_id: CollectionId,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub dense_vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkValidationError {
    #[error("chunk content exceeds the configured chunk size ({len} > {max})")]
    TooLarge { len: usize, max: usize },
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl ChunkRecord {
    /// Invariant from the data model: `content` is bounded by `CHUNK_SIZE`
    /// and `dense_vector` must match the store's configured dimension.
    pub fn validate(&self, max_content_len: usize, expected_dim: usize) -> Result<(), ChunkValidationError> {
        let len = self.content.chars().count();
        if len > max_content_len {
            return Err(ChunkValidationError::TooLarge { len, max: max_content_len });
        }
        if self.dense_vector.len() != expected_dim {
            return Err(ChunkValidationError::DimensionMismatch {
                expected: expected_dim,
                actual: self.dense_vector.len(),
            });
        }
        Ok(())
    }
}
