//! Error taxonomy shared by the store contract, fusion, retrieval, and ingestion.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed source error carried by store and collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The ingest root does not exist or is not a directory.
    #[error("directory not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Chunk and embedding counts differ for a file being added.
    #[error(
        "consistency error for '{filename}': {chunks} chunks but {embeddings} embeddings"
    )]
    Consistency {
        filename: String,
        chunks: usize,
        embeddings: usize,
    },

    /// An embedding's length differs from the deployment's dimensionality.
    #[error("dimension mismatch for '{filename}': expected {expected}, got {actual}")]
    Dimension {
        filename: String,
        expected: usize,
        actual: usize,
    },

    /// A file with this filename is already stored.
    #[error("file already exists: {0}")]
    DuplicateFile(String),

    /// Communicating with or executing against the store failed.
    #[error("store error: {0}")]
    Store(#[source] BoxError),

    /// A ranked list handed to fusion is malformed.
    #[error("invalid fusion input: {0}")]
    FusionInput(String),

    /// The document loader could not produce chunks for a file.
    #[error("failed to load '{filename}': {source}")]
    Load {
        filename: String,
        #[source]
        source: BoxError,
    },

    /// The embedder failed for a file's chunks.
    #[error("failed to embed '{filename}': {source}")]
    Embed {
        filename: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Wrap any backend failure as [`Error::Store`].
    pub fn store(err: impl Into<BoxError>) -> Self {
        Error::Store(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound(PathBuf::from("/no/such/dir"));
        assert_eq!(err.to_string(), "directory not found: /no/such/dir");
    }

    #[test]
    fn test_consistency_display() {
        let err = Error::Consistency {
            filename: "a.md".to_string(),
            chunks: 3,
            embeddings: 2,
        };
        let display = err.to_string();
        assert!(display.contains("a.md"));
        assert!(display.contains("3 chunks"));
        assert!(display.contains("2 embeddings"));
    }

    #[test]
    fn test_dimension_display() {
        let err = Error::Dimension {
            filename: "odd.md".to_string(),
            expected: 16,
            actual: 8,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch for 'odd.md': expected 16, got 8"
        );
    }

    #[test]
    fn test_store_keeps_source() {
        let err = Error::store("connection refused");
        assert!(err.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_load_from_anyhow() {
        let err = Error::Load {
            filename: "broken.pdf".to_string(),
            source: anyhow::anyhow!("bad xref table").into(),
        };
        let display = err.to_string();
        assert!(display.contains("broken.pdf"));
        assert!(display.contains("bad xref table"));
    }
}
