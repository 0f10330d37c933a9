//! SQLite-backed [`Store`] implementation.
//!
//! Files and chunks live in two ordinary tables; chunk text is mirrored into
//! an FTS5 table for the lexical channel. Creates and deletes each run in one
//! transaction, so a file is visible with all of its chunks or not at all.
//!
//! The vector channel is an exact scan: every chunk embedding is decoded and
//! compared by cosine distance. The candidate pool therefore never drops a
//! true neighbour.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use docfusion_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use docfusion_core::models::{FileChunk, FileRecord, LexicalHit, NewFile, VectorHit};
use docfusion_core::store::{check_dimensions, lexical_terms, Store};
use docfusion_core::{Error, Result};

use crate::config::DbConfig;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    files: String,
    chunks: String,
    fts: String,
}

#[derive(FromRow)]
struct FileRow {
    id: String,
    filename: String,
    chunk_ids: String,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = Error;

    fn try_from(row: FileRow) -> Result<Self> {
        let chunk_ids: Vec<String> = serde_json::from_str(&row.chunk_ids).map_err(|e| {
            Error::store(format!(
                "file '{}' has a malformed chunk id list: {}",
                row.filename, e
            ))
        })?;
        Ok(FileRecord {
            id: row.id,
            filename: row.filename,
            chunk_ids,
        })
    }
}

#[derive(FromRow)]
struct ChunkRow {
    id: String,
    file_id: String,
    text: String,
    embedding: Vec<u8>,
}

impl TryFrom<ChunkRow> for FileChunk {
    type Error = Error;

    fn try_from(row: ChunkRow) -> Result<Self> {
        let embedding = blob_to_vec(&row.embedding).ok_or_else(|| {
            Error::store(format!(
                "chunk '{}' has an embedding blob of {} bytes",
                row.id,
                row.embedding.len()
            ))
        })?;
        Ok(FileChunk {
            id: row.id,
            file_id: row.file_id,
            text: row.text,
            embedding,
        })
    }
}

#[derive(FromRow)]
struct FtsRow {
    chunk_id: String,
    text: String,
    rank: f64,
}

fn store_err(e: sqlx::Error) -> Error {
    Error::store(e)
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, db: &DbConfig) -> Self {
        Self {
            pool,
            files: db.files_table.clone(),
            chunks: db.chunks_table.clone(),
            fts: db.fts_table(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn manifest_diff(&self, candidates: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let names = serde_json::to_string(candidates).map_err(Error::store)?;
        let missing: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT value FROM json_each(?) WHERE value NOT IN (SELECT filename FROM {})",
            self.files
        ))
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(missing.into_iter().collect())
    }

    async fn create_file_with_chunks(&self, file: &NewFile) -> Result<String> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO {} (id, filename, chunk_ids) VALUES (?, ?, '[]')",
            self.files
        ))
        .bind(&file.id)
        .bind(&file.filename)
        .execute(&mut *tx)
        .await;
        if let Err(e) = inserted {
            return Err(match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    Error::DuplicateFile(file.filename.clone())
                }
                other => store_err(other),
            });
        }

        // The insert above holds the write lock, so no other writer can change this
        let stored_bytes: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT length(embedding) FROM {} LIMIT 1",
            self.chunks
        ))
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;
        check_dimensions(file, stored_bytes.map(|b| b as usize / 4))?;

        let mut chunk_ids = Vec::with_capacity(file.chunks.len());
        for (position, chunk) in file.chunks.iter().enumerate() {
            let chunk_id = uuid::Uuid::new_v4().to_string();
            sqlx::query(&format!(
                "INSERT INTO {} (id, file_id, position, text, embedding) VALUES (?, ?, ?, ?, ?)",
                self.chunks
            ))
            .bind(&chunk_id)
            .bind(&file.id)
            .bind(position as i64)
            .bind(&chunk.text)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

            sqlx::query(&format!(
                "INSERT INTO {} (chunk_id, text) VALUES (?, ?)",
                self.fts
            ))
            .bind(&chunk_id)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

            chunk_ids.push(chunk_id);
        }

        let chunk_ids = serde_json::to_string(&chunk_ids).map_err(Error::store)?;
        sqlx::query(&format!(
            "UPDATE {} SET chunk_ids = ? WHERE id = ?",
            self.files
        ))
        .bind(chunk_ids)
        .bind(&file.id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(file.id.clone())
    }

    async fn delete_file_cascade(&self, filename: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // Write first: a read-then-write transaction cannot wait for the lock in WAL mode
        let deleted: Option<(String, String)> = sqlx::query_as(&format!(
            "DELETE FROM {} WHERE filename = ? RETURNING id, chunk_ids",
            self.files
        ))
        .bind(filename)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;
        let Some((file_id, chunk_ids)) = deleted else {
            return Ok(false);
        };

        sqlx::query(&format!(
            "DELETE FROM {} WHERE chunk_id IN (SELECT value FROM json_each(?))",
            self.fts
        ))
        .bind(&chunk_ids)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // Already removed by ON DELETE CASCADE when foreign keys are enforced
        sqlx::query(&format!("DELETE FROM {} WHERE file_id = ?", self.chunks))
            .bind(&file_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(true)
    }

    async fn vector_query(
        &self,
        embedding: &[f32],
        candidate_pool: usize,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let rows: Vec<ChunkRow> = sqlx::query_as(&format!(
            "SELECT id, file_id, text, embedding FROM {} ORDER BY rowid",
            self.chunks
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let chunk = FileChunk::try_from(row)?;
            if chunk.embedding.len() != embedding.len() {
                return Err(Error::store(format!(
                    "query has {} dimensions but chunk {} has {}",
                    embedding.len(),
                    chunk.id,
                    chunk.embedding.len()
                )));
            }
            hits.push(VectorHit {
                distance: cosine_distance(embedding, &chunk.embedding),
                chunk_id: chunk.id,
                text: chunk.text,
            });
        }

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
        let expr = terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR ");

        let rows: Vec<FtsRow> = sqlx::query_as(&format!(
            r#"
            SELECT chunk_id, text, rank
            FROM {fts}
            WHERE {fts} MATCH ?
            ORDER BY rank, rowid
            LIMIT ?
            "#,
            fts = self.fts
        ))
        .bind(expr)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        // FTS5 rank is bm25, where lower is better
        Ok(rows
            .into_iter()
            .map(|r| LexicalHit {
                chunk_id: r.chunk_id,
                text: r.text,
                relevance: -r.rank,
            })
            .collect())
    }

    async fn get_file(&self, filename: &str) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(&format!(
            "SELECT id, filename, chunk_ids FROM {} WHERE filename = ?",
            self.files
        ))
        .bind(filename)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(FileRecord::try_from).transpose()
    }

    async fn list_files(&self) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(&format!(
            "SELECT id, filename, chunk_ids FROM {} ORDER BY filename",
            self.files
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(FileRecord::try_from).collect()
    }

    async fn file_chunks(&self, file_id: &str) -> Result<Vec<FileChunk>> {
        let rows: Vec<ChunkRow> = sqlx::query_as(&format!(
            "SELECT id, file_id, text, embedding FROM {} WHERE file_id = ? ORDER BY position",
            self.chunks
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(FileChunk::try_from).collect()
    }
}
