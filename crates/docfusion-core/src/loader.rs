//! Directory-listing and document-loading collaborators used by ingestion.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Lists candidate files beneath an ingest root.
#[async_trait]
pub trait FileLister: Send + Sync {
    /// Recursively list every applicable file under `root`.
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) when `root`
    /// does not exist or is not a directory.
    async fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

/// Extracts an ordered sequence of text chunks from one file.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path) -> anyhow::Result<Vec<String>>;
}
