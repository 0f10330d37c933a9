//! In-memory [`Store`] implementation for tests and embedding in other hosts.
//!
//! All state sits behind one `parking_lot::RwLock`, so a create or a delete
//! is applied under a single write guard and readers never observe a
//! half-written file. Vector search is brute-force cosine distance; lexical
//! search scores chunks by total term occurrences.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::embedding::cosine_distance;
use crate::error::{Error, Result};
use crate::models::{FileChunk, FileRecord, LexicalHit, NewFile, VectorHit};

use super::{check_dimensions, lexical_terms, Store};

#[derive(Default)]
struct State {
    /// Keyed by filename.
    files: BTreeMap<String, FileRecord>,
    /// Insertion order.
    chunks: Vec<FileChunk>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total chunks across all files.
    pub fn chunk_count(&self) -> usize {
        self.state.read().chunks.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn manifest_diff(&self, candidates: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let state = self.state.read();
        Ok(candidates
            .iter()
            .filter(|name| !state.files.contains_key(*name))
            .cloned()
            .collect())
    }

    async fn create_file_with_chunks(&self, file: &NewFile) -> Result<String> {
        let mut state = self.state.write();
        if state.files.contains_key(&file.filename) {
            return Err(Error::DuplicateFile(file.filename.clone()));
        }
        if state.files.values().any(|f| f.id == file.id) {
            return Err(Error::store(format!("file id '{}' already exists", file.id)));
        }
        check_dimensions(file, state.chunks.first().map(|c| c.embedding.len()))?;

        let mut chunk_ids = Vec::with_capacity(file.chunks.len());
        for chunk in &file.chunks {
            let id = uuid::Uuid::new_v4().to_string();
            state.chunks.push(FileChunk {
                id: id.clone(),
                file_id: file.id.clone(),
                text: chunk.text.clone(),
                embedding: chunk.embedding.clone(),
            });
            chunk_ids.push(id);
        }
        state.files.insert(
            file.filename.clone(),
            FileRecord {
                id: file.id.clone(),
                filename: file.filename.clone(),
                chunk_ids,
            },
        );
        Ok(file.id.clone())
    }

    async fn delete_file_cascade(&self, filename: &str) -> Result<bool> {
        let mut state = self.state.write();
        match state.files.remove(filename) {
            Some(file) => {
                state.chunks.retain(|c| c.file_id != file.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn vector_query(
        &self,
        embedding: &[f32],
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let state = self.state.read();
        if let Some(chunk) = state
            .chunks
            .iter()
            .find(|c| c.embedding.len() != embedding.len())
        {
            return Err(Error::store(format!(
                "query has {} dimensions but chunk {} has {}",
                embedding.len(),
                chunk.id,
                chunk.embedding.len()
            )));
        }

        let mut hits: Vec<VectorHit> = state
            .chunks
            .iter()
            .map(|c| VectorHit {
                chunk_id: c.id.clone(),
                text: c.text.clone(),
                distance: cosine_distance(embedding, &c.embedding),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(candidate_pool);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn lexical_query(&self, text: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let terms = lexical_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read();
        let mut hits: Vec<LexicalHit> = state
            .chunks
            .iter()
            .filter_map(|c| {
                let words: Vec<String> = c
                    .text
                    .split(|ch: char| !ch.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .map(str::to_lowercase)
                    .collect();
                let matches = words.iter().filter(|w| terms.contains(w)).count();
                (matches > 0).then(|| LexicalHit {
                    chunk_id: c.id.clone(),
                    text: c.text.clone(),
                    relevance: matches as f64,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_file(&self, filename: &str) -> Result<Option<FileRecord>> {
        Ok(self.state.read().files.get(filename).cloned())
    }

    async fn list_files(&self) -> Result<Vec<FileRecord>> {
        Ok(self.state.read().files.values().cloned().collect())
    }

    async fn file_chunks(&self, file_id: &str) -> Result<Vec<FileChunk>> {
        let state = self.state.read();
        let Some(file) = state.files.values().find(|f| f.id == file_id) else {
            return Ok(Vec::new());
        };
        Ok(file
            .chunk_ids
            .iter()
            .filter_map(|id| state.chunks.iter().find(|c| &c.id == id).cloned())
            .collect())
    }
}
