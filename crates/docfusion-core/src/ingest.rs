//! Idempotent, dedup-aware ingestion.
//!
//! [`IngestionCoordinator`] sits between a directory of documents and a
//! [`Store`]. For a directory it:
//!
//! 1. Lists candidate files through the [`FileLister`].
//! 2. Keys each candidate by its basename; on a collision the first path in
//!    sorted order wins and the rest are reported.
//! 3. Asks the store which keys are not yet stored (manifest difference).
//! 4. For each missing file, concurrently up to `concurrency`: load chunks,
//!    embed them, and write the file with all its chunks in one atomic
//!    create.
//!
//! Dedup is by name only. A changed file with an already-stored name is not
//! re-ingested; delete it first.
//!
//! A failure on one file is recorded in the [`IngestReport`] and does not
//! abort the batch. A create rejected as a duplicate (another writer got
//! there first) counts as already ingested.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{future, stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::loader::{DocumentLoader, FileLister};
use crate::models::{NewChunk, NewFile};
use crate::store::Store;

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Files processed at the same time. Values below 1 are treated as 1.
    pub concurrency: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestedFile {
    pub filename: String,
    pub file_id: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

/// Outcome of one [`IngestionCoordinator::ingest_directory`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Distinct filenames found under the root.
    pub candidates: usize,
    /// Candidates the store already held before this run.
    pub already_present: usize,
    pub ingested: Vec<IngestedFile>,
    /// Filenames another writer created while this run was processing them.
    pub raced: Vec<String>,
    pub failed: Vec<FailedFile>,
    /// Paths skipped because an earlier path has the same basename.
    pub name_collisions: Vec<PathBuf>,
    /// True when cancellation stopped the run before every file was started.
    pub cancelled: bool,
}

impl IngestReport {
    pub fn skipped(&self) -> usize {
        self.already_present + self.raced.len()
    }
}

pub struct IngestionCoordinator<S: Store + ?Sized> {
    store: Arc<S>,
    lister: Arc<dyn FileLister>,
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn Embedder>,
    options: IngestOptions,
}

impl<S: Store + ?Sized> IngestionCoordinator<S> {
    pub fn new(
        store: Arc<S>,
        lister: Arc<dyn FileLister>,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn Embedder>,
        options: IngestOptions,
    ) -> Self {
        Self {
            store,
            lister,
            loader,
            embedder,
            options,
        }
    }

    /// Ingest every not-yet-stored file under `root`.
    ///
    /// Fails with [`Error::NotFound`] if `root` is not a directory and with
    /// [`Error::Store`] if the manifest difference cannot be computed.
    /// Per-file failures land in the report. Once `cancel` fires no new file
    /// is started; files already in flight run to completion.
    pub async fn ingest_directory(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let mut paths = self.lister.list_files(root).await?;
        paths.sort();

        let mut report = IngestReport::default();
        let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in paths {
            let Some(key) = dedup_key(&path) else {
                warn!(path = %path.display(), "skipping path without a file name");
                continue;
            };
            if by_name.contains_key(&key) {
                warn!(path = %path.display(), filename = %key, "duplicate file name, skipping");
                report.name_collisions.push(path);
            } else {
                by_name.insert(key, path);
            }
        }

        let candidates: BTreeSet<String> = by_name.keys().cloned().collect();
        let missing = self.store.manifest_diff(&candidates).await?;
        report.candidates = candidates.len();
        report.already_present = candidates.len().saturating_sub(missing.len());
        info!(
            root = %root.display(),
            candidates = report.candidates,
            missing = missing.len(),
            "manifest compared"
        );

        let work: Vec<(String, PathBuf)> = missing
            .into_iter()
            .filter_map(|name| by_name.remove(&name).map(|path| (name, path)))
            .collect();
        let total = work.len();

        let outcomes: Vec<(String, Result<IngestedFile>)> = stream::iter(work)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|(name, path)| async move {
                let outcome = self.ingest_file(&name, &path).await;
                (name, outcome)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        report.cancelled = outcomes.len() < total;
        if report.cancelled {
            warn!(
                started = outcomes.len(),
                remaining = total - outcomes.len(),
                "ingestion cancelled"
            );
        }

        for (filename, outcome) in outcomes {
            match outcome {
                Ok(file) => report.ingested.push(file),
                Err(Error::DuplicateFile(_)) => {
                    debug!(filename = %filename, "created concurrently by another writer");
                    report.raced.push(filename);
                }
                Err(e) => {
                    warn!(filename = %filename, error = %e, "file ingestion failed");
                    report.failed.push(FailedFile {
                        filename,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.ingested.sort_by(|a, b| a.filename.cmp(&b.filename));
        report.raced.sort();
        report.failed.sort_by(|a, b| a.filename.cmp(&b.filename));

        Ok(report)
    }

    /// Load, embed, and store one file under `filename`.
    pub async fn ingest_file(&self, filename: &str, path: &Path) -> Result<IngestedFile> {
        let chunks = self.loader.load(path).await.map_err(|e| Error::Load {
            filename: filename.to_string(),
            source: e.into(),
        })?;
        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .embed(&chunks)
                .await
                .map_err(|e| Error::Embed {
                    filename: filename.to_string(),
                    source: e.into(),
                })?
        };

        let count = chunks.len();
        let file_id = self.add_file(filename, chunks, embeddings).await?;
        info!(filename = %filename, file_id = %file_id, chunks = count, "file ingested");
        Ok(IngestedFile {
            filename: filename.to_string(),
            file_id,
            chunks: count,
        })
    }

    /// Store a file and its chunks atomically under a fresh id.
    ///
    /// Fails with [`Error::Consistency`] when the chunk and embedding counts
    /// differ, with [`Error::Dimension`] when a vector's length is not the
    /// embedder's `dims()`, and with [`Error::DuplicateFile`] when the name
    /// is taken.
    pub async fn add_file(
        &self,
        filename: &str,
        chunks: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<String> {
        if chunks.len() != embeddings.len() {
            return Err(Error::Consistency {
                filename: filename.to_string(),
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        let expected = self.embedder.dims();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(Error::Dimension {
                filename: filename.to_string(),
                expected,
                actual: bad.len(),
            });
        }

        let file = NewFile {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            chunks: chunks
                .into_iter()
                .zip(embeddings)
                .map(|(text, embedding)| NewChunk { text, embedding })
                .collect(),
        };
        self.store.create_file_with_chunks(&file).await
    }

    /// Delete a file and all its chunks. Returns `false` if no file has that
    /// name.
    pub async fn delete_file(&self, filename: &str) -> Result<bool> {
        let deleted = self.store.delete_file_cascade(filename).await?;
        if deleted {
            info!(filename = %filename, "file deleted");
        } else {
            info!(filename = %filename, "file not found, nothing deleted");
        }
        Ok(deleted)
    }
}

/// The dedup key for a path: its basename.
pub fn dedup_key(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::{FileChunk, FileRecord, LexicalHit, VectorHit};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Serves a fixed listing; `None` behaves like a missing root.
    struct StaticLister(Option<Vec<PathBuf>>);

    #[async_trait]
    impl FileLister for StaticLister {
        async fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
            self.0
                .clone()
                .ok_or_else(|| Error::NotFound(root.to_path_buf()))
        }
    }

    /// Chunks each file's text on `|`; files named `bad*` fail to load.
    struct MapLoader {
        files: HashMap<PathBuf, String>,
        cancel_on_load: Option<CancellationToken>,
    }

    #[async_trait]
    impl DocumentLoader for MapLoader {
        async fn load(&self, path: &Path) -> anyhow::Result<Vec<String>> {
            if let Some(token) = &self.cancel_on_load {
                token.cancel();
            }
            if dedup_key(path).is_some_and(|n| n.starts_with("bad")) {
                anyhow::bail!("unreadable document");
            }
            let text = self
                .files
                .get(path)
                .ok_or_else(|| anyhow::anyhow!("no such file"))?;
            Ok(text
                .split('|')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect())
        }
    }

    /// Drops the last vector of every batch.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.5; 4]; texts.len().saturating_sub(1)])
        }
    }

    /// Claims every candidate is missing so creates collide with existing
    /// files, as when another writer wins the race.
    struct RacingStore(InMemoryStore);

    #[async_trait]
    impl Store for RacingStore {
        async fn manifest_diff(&self, c: &BTreeSet<String>) -> Result<BTreeSet<String>> {
            Ok(c.clone())
        }
        async fn create_file_with_chunks(&self, f: &NewFile) -> Result<String> {
            self.0.create_file_with_chunks(f).await
        }
        async fn delete_file_cascade(&self, n: &str) -> Result<bool> {
            self.0.delete_file_cascade(n).await
        }
        async fn vector_query(&self, e: &[f32], p: usize, l: usize) -> Result<Vec<VectorHit>> {
            self.0.vector_query(e, p, l).await
        }
        async fn lexical_query(&self, t: &str, l: usize) -> Result<Vec<LexicalHit>> {
            self.0.lexical_query(t, l).await
        }
        async fn get_file(&self, n: &str) -> Result<Option<FileRecord>> {
            self.0.get_file(n).await
        }
        async fn list_files(&self) -> Result<Vec<FileRecord>> {
            self.0.list_files().await
        }
        async fn file_chunks(&self, id: &str) -> Result<Vec<FileChunk>> {
            self.0.file_chunks(id).await
        }
    }

    fn corpus(entries: &[(&str, &str)]) -> (Vec<PathBuf>, HashMap<PathBuf, String>) {
        let mut paths = Vec::new();
        let mut files = HashMap::new();
        for (path, text) in entries {
            paths.push(PathBuf::from(path));
            files.insert(PathBuf::from(path), text.to_string());
        }
        (paths, files)
    }

    fn coordinator<S: Store + ?Sized>(
        store: Arc<S>,
        entries: &[(&str, &str)],
        embedder: Arc<dyn Embedder>,
        concurrency: usize,
        cancel_on_load: Option<CancellationToken>,
    ) -> IngestionCoordinator<S> {
        let (paths, files) = corpus(entries);
        IngestionCoordinator::new(
            store,
            Arc::new(StaticLister(Some(paths))),
            Arc::new(MapLoader {
                files,
                cancel_on_load,
            }),
            embedder,
            IngestOptions { concurrency },
        )
    }

    const DOCS: &[(&str, &str)] = &[
        ("/docs/a.md", "alpha one|alpha two|alpha three"),
        ("/docs/sub/b.txt", "bravo"),
        ("/docs/c.md", "charlie one|charlie two"),
    ];

    #[tokio::test]
    async fn test_round_trip() {
        let store = Arc::new(InMemoryStore::new());
        let c = coordinator(store.clone(), DOCS, Arc::new(HashEmbedder::new(16)), 4, None);
        let report = c
            .ingest_directory(Path::new("/docs"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.candidates, 3);
        assert_eq!(report.already_present, 0);
        assert!(report.failed.is_empty());
        assert!(!report.cancelled);
        let names: Vec<&str> = report.ingested.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.txt", "c.md"]);

        let a = store.get_file("a.md").await.unwrap().unwrap();
        assert_eq!(a.chunk_ids.len(), 3);
        let chunks = store.file_chunks(&a.id).await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, "alpha two");
        assert!(chunks.iter().all(|ch| ch.embedding.len() == 16));
        assert_eq!(store.chunk_count(), 6);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let c = coordinator(store.clone(), DOCS, Arc::new(HashEmbedder::new(16)), 2, None);
        let token = CancellationToken::new();
        c.ingest_directory(Path::new("/docs"), &token).await.unwrap();
        let again = c.ingest_directory(Path::new("/docs"), &token).await.unwrap();

        assert!(again.ingested.is_empty());
        assert_eq!(again.already_present, 3);
        assert_eq!(again.skipped(), 3);
        assert_eq!(store.chunk_count(), 6);
    }

    #[tokio::test]
    async fn test_missing_root() {
        let c = IngestionCoordinator::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(StaticLister(None)),
            Arc::new(MapLoader {
                files: HashMap::new(),
                cancel_on_load: None,
            }),
            Arc::new(HashEmbedder::new(4)),
            IngestOptions::default(),
        );
        let err = c
            .ingest_directory(Path::new("/nope"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(p) if p == Path::new("/nope")));
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_batch() {
        let store = Arc::new(InMemoryStore::new());
        let entries = [("/d/bad.pdf", "x"), ("/d/good.md", "fine")];
        let c = coordinator(store.clone(), &entries, Arc::new(HashEmbedder::new(4)), 4, None);
        let report = c
            .ingest_directory(Path::new("/d"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.ingested.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "bad.pdf");
        assert!(report.failed[0].error.contains("unreadable document"));
        assert!(store.get_file("bad.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_embedding_count_mismatch_is_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let c = coordinator(store.clone(), DOCS, Arc::new(ShortEmbedder), 4, None);
        let report = c
            .ingest_directory(Path::new("/docs"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.ingested.is_empty());
        assert_eq!(report.failed.len(), 3);
        assert!(report.failed[0].error.contains("consistency error"));
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_basename_collision_first_path_wins() {
        let store = Arc::new(InMemoryStore::new());
        let entries = [("/d/z/readme.md", "from z"), ("/d/a/readme.md", "from a")];
        let c = coordinator(store.clone(), &entries, Arc::new(HashEmbedder::new(4)), 4, None);
        let report = c
            .ingest_directory(Path::new("/d"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.candidates, 1);
        assert_eq!(report.name_collisions, vec![PathBuf::from("/d/z/readme.md")]);
        let file = store.get_file("readme.md").await.unwrap().unwrap();
        let chunks = store.file_chunks(&file.id).await.unwrap();
        assert_eq!(chunks[0].text, "from a");
    }

    #[tokio::test]
    async fn test_racing_duplicate_counts_as_present() {
        let inner = InMemoryStore::new();
        inner
            .create_file_with_chunks(&NewFile {
                id: "existing".to_string(),
                filename: "a.md".to_string(),
                chunks: Vec::new(),
            })
            .await
            .unwrap();
        let store = Arc::new(RacingStore(inner));
        let c = coordinator(store.clone(), DOCS, Arc::new(HashEmbedder::new(4)), 4, None);
        let report = c
            .ingest_directory(Path::new("/docs"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.raced, vec!["a.md".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(report.ingested.len(), 2);
        assert_eq!(report.skipped(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let store = Arc::new(InMemoryStore::new());
        let c = coordinator(store.clone(), DOCS, Arc::new(HashEmbedder::new(4)), 4, None);
        let token = CancellationToken::new();
        token.cancel();
        let report = c.ingest_directory(Path::new("/docs"), &token).await.unwrap();

        assert!(report.cancelled);
        assert!(report.ingested.is_empty());
        assert!(store.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_lets_in_flight_file_finish() {
        let store = Arc::new(InMemoryStore::new());
        let token = CancellationToken::new();
        let c = coordinator(
            store.clone(),
            DOCS,
            Arc::new(HashEmbedder::new(4)),
            1,
            Some(token.clone()),
        );
        let report = c.ingest_directory(Path::new("/docs"), &token).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.ingested.len(), 1);
        assert_eq!(report.ingested[0].filename, "a.md");
        assert_eq!(store.list_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_file_count_mismatch() {
        let store = Arc::new(InMemoryStore::new());
        let c = coordinator(store.clone(), &[], Arc::new(HashEmbedder::new(4)), 1, None);
        let err = c
            .add_file("x.md", vec!["a".into(), "b".into()], vec![vec![0.0; 4]])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Consistency {
                chunks: 2,
                embeddings: 1,
                ..
            }
        ));
        assert!(store.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_file_wrong_dimensionality_keeps_search_working() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(HashEmbedder::new(16));
        let c = coordinator(store.clone(), DOCS, embedder.clone(), 4, None);
        c.ingest_directory(Path::new("/docs"), &CancellationToken::new())
            .await
            .unwrap();

        let err = c
            .add_file("odd.md", vec!["rust".into()], vec![vec![0.5; 8]])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Dimension {
                expected: 16,
                actual: 8,
                ..
            }
        ));
        assert!(store.get_file("odd.md").await.unwrap().is_none());

        let engine = crate::search::HybridRetrievalEngine::new(
            store,
            crate::search::RetrievalParams::default(),
        );
        let hits = engine
            .search("alpha", &embedder.embed_text("alpha"), 4)
            .await
            .unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_embedder_with_wrong_dims_is_recorded_as_failure() {
        /// Claims 4 dimensions but returns 3.
        struct LyingEmbedder;

        #[async_trait]
        impl Embedder for LyingEmbedder {
            fn model_name(&self) -> &str {
                "lying"
            }
            fn dims(&self) -> usize {
                4
            }
            async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
                Ok(vec![vec![0.5; 3]; texts.len()])
            }
        }

        let store = Arc::new(InMemoryStore::new());
        let c = coordinator(store.clone(), DOCS, Arc::new(LyingEmbedder), 4, None);
        let report = c
            .ingest_directory(Path::new("/docs"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.ingested.is_empty());
        assert_eq!(report.failed.len(), 3);
        assert!(report.failed[0].error.contains("dimension mismatch"));
        assert_eq!(store.chunk_count(), 0);
    }

    #[tokio::test]
    async fn test_add_file_duplicate() {
        let store = Arc::new(InMemoryStore::new());
        let c = coordinator(store.clone(), &[], Arc::new(HashEmbedder::new(4)), 1, None);
        c.add_file("x.md", vec![], vec![]).await.unwrap();
        let err = c.add_file("x.md", vec![], vec![]).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateFile(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_and_missing_is_noop() {
        let store = Arc::new(InMemoryStore::new());
        let c = coordinator(store.clone(), DOCS, Arc::new(HashEmbedder::new(4)), 4, None);
        c.ingest_directory(Path::new("/docs"), &CancellationToken::new())
            .await
            .unwrap();
        let a = store.get_file("a.md").await.unwrap().unwrap();

        assert!(c.delete_file("a.md").await.unwrap());
        assert!(store.file_chunks(&a.id).await.unwrap().is_empty());
        assert_eq!(store.chunk_count(), 3);
        assert!(!c.delete_file("a.md").await.unwrap());

        // Deleted files are picked up again on the next run.
        let report = c
            .ingest_directory(Path::new("/docs"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.ingested.len(), 1);
        assert_eq!(report.ingested[0].filename, "a.md");
    }
}
