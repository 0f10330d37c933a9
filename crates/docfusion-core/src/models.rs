//! Records persisted by the store and the transient ranked hits returned by search.

use serde::Serialize;

/// A stored file: the unit of deduplication and deletion.
///
/// `chunk_ids` lists the owned [`FileChunk`]s in load order. It is assigned
/// once, inside the same transaction that creates the file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub chunk_ids: Vec<String>,
}

/// One chunk of extracted text with its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FileChunk {
    pub id: String,
    /// Identity of the owning [`FileRecord`].
    pub file_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Chunk payload for a file that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Everything the store needs to create a file and its chunks atomically.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Pre-generated file identity.
    pub id: String,
    pub filename: String,
    pub chunks: Vec<NewChunk>,
}

/// A vector-channel result, ordered by ascending distance.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    pub text: String,
    /// Cosine distance (`1 - cosine similarity`); lower is closer.
    pub distance: f64,
}

/// A lexical-channel result, ordered by descending relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub text: String,
    pub relevance: f64,
}

/// A fused search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedHit {
    pub chunk_id: String,
    pub text: String,
    /// Reciprocal rank fusion score.
    pub score: f64,
    /// 1-based position in the vector channel, if present there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_distance: Option<f64>,
    /// 1-based position in the lexical channel, if present there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_relevance: Option<f64>,
}
