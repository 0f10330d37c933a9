//! Text extraction and chunking for files on disk.
//!
//! PDFs go through `pdf-extract`; everything else is read as UTF-8 text.
//! Extracted text is split with the paragraph chunker.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

use docfusion_core::chunk::chunk_text;
use docfusion_core::loader::DocumentLoader;

pub struct FileLoader {
    max_tokens: usize,
}

impl FileLoader {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<Vec<String>> {
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        let text = if is_pdf {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await?
                .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?
        } else {
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))?
        };

        Ok(chunk_text(&text, self.max_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_text_file_chunks() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        std::fs::write(&path, "# Title\n\nFirst paragraph.\n\nSecond paragraph.").unwrap();

        let chunks = FileLoader::new(5).load(&path).await.unwrap();
        assert_eq!(
            chunks,
            vec!["# Title", "First paragraph.", "Second paragraph."]
        );
        let whole = FileLoader::new(700).load(&path).await.unwrap();
        assert_eq!(whole.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_has_no_chunks() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();
        assert!(FileLoader::new(700).load(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("binary.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        assert!(FileLoader::new(700).load(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_pdf_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        assert!(FileLoader::new(700).load(&path).await.is_err());
    }
}
