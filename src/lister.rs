//! Recursive directory listing filtered by glob.

use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use docfusion_core::loader::FileLister;
use docfusion_core::Error;

use crate::config::IngestConfig;

/// Lists regular files under a root whose root-relative path matches an
/// include glob and no exclude glob.
pub struct FsLister {
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl FsLister {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        excludes.extend(config.exclude_globs.iter().cloned());

        Ok(Self {
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&excludes)?,
            follow_symlinks: config.follow_symlinks,
        })
    }
}

#[async_trait]
impl FileLister for FsLister {
    async fn list_files(&self, root: &Path) -> docfusion_core::Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(Error::NotFound(root.to_path_buf()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(self.follow_symlinks) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.exclude.is_match(relative) || !self.include.is_match(relative) {
                continue;
            }
            paths.push(path.to_path_buf());
        }

        paths.sort();
        Ok(paths)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
