//! Storage contract for docfusion.
//!
//! The [`Store`] trait is everything the ingestion coordinator and the
//! retrieval engine need from a persistence backend: a manifest difference
//! over filenames, an atomic file-plus-chunks write, an atomic cascading
//! delete, and the two ranked queries that feed fusion.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! The in-memory backend lives in [`memory`]; the SQLite backend lives in the
//! `docfusion` application crate.

pub mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{FileChunk, FileRecord, LexicalHit, NewFile, VectorHit};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`manifest_diff`](Store::manifest_diff) | Candidate filenames not yet stored |
/// | [`create_file_with_chunks`](Store::create_file_with_chunks) | Atomic file + chunks write |
/// | [`delete_file_cascade`](Store::delete_file_cascade) | Atomic delete of a file and its chunks |
/// | [`vector_query`](Store::vector_query) | Nearest chunks by embedding distance |
/// | [`lexical_query`](Store::lexical_query) | Chunks by full-text relevance |
/// | [`get_file`](Store::get_file) | Look up one file by filename |
/// | [`list_files`](Store::list_files) | All stored files |
/// | [`file_chunks`](Store::file_chunks) | Chunks owned by a file, in load order |
///
/// Every failure is reported as [`Error::Store`](crate::Error::Store), except
/// a filename collision on create, which is
/// [`Error::DuplicateFile`](crate::Error::DuplicateFile). Calls are never
/// retried by callers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Return the subset of `candidates` that no stored file is named after.
    async fn manifest_diff(&self, candidates: &BTreeSet<String>) -> Result<BTreeSet<String>>;

    /// Create a file with an empty chunk list, insert all of its chunks, then
    /// set the file's chunk list to the inserted ids, as one indivisible unit.
    ///
    /// Returns the file id. Nothing is written if any step fails, including
    /// when an embedding's length differs from the chunks already stored
    /// ([`Error::Dimension`](crate::Error::Dimension)).
    async fn create_file_with_chunks(&self, file: &NewFile) -> Result<String>;

    /// Delete the named file and every chunk it owns as one indivisible unit.
    ///
    /// Returns `false` when no file has that name.
    async fn delete_file_cascade(&self, filename: &str) -> Result<bool>;

    /// Up to `limit` chunks nearest to `embedding`, by ascending cosine
    /// distance, drawn from a candidate pool of `candidate_pool` neighbours.
    async fn vector_query(
        &self,
        embedding: &[f32],
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<VectorHit>>;

    /// Up to `limit` chunks matching `text`, by descending relevance.
    ///
    /// Text with no searchable terms yields an empty list.
    async fn lexical_query(&self, text: &str, limit: usize) -> Result<Vec<LexicalHit>>;

    async fn get_file(&self, filename: &str) -> Result<Option<FileRecord>>;

    /// All stored files, ordered by filename.
    async fn list_files(&self) -> Result<Vec<FileRecord>>;

    async fn file_chunks(&self, file_id: &str) -> Result<Vec<FileChunk>>;
}

/// Split query text into lowercase alphanumeric search terms, deduplicated
/// in first-seen order.
///
/// Punctuation never reaches a backend's query syntax.
pub fn lexical_terms(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Check that every chunk of `file` has the dimensionality of the vectors
/// already stored, or of its own first chunk when the store holds none.
pub fn check_dimensions(file: &NewFile, stored: Option<usize>) -> Result<()> {
    let Some(expected) = stored.or_else(|| file.chunks.first().map(|c| c.embedding.len())) else {
        return Ok(());
    };
    match file.chunks.iter().find(|c| c.embedding.len() != expected) {
        Some(chunk) => Err(Error::Dimension {
            filename: file.filename.clone(),
            expected,
            actual: chunk.embedding.len(),
        }),
        None => Ok(()),
    }
}
