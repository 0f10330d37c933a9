//! Composition root.
//!
//! [`Services`] builds every long-lived collaborator exactly once (pool,
//! store, embedder, lister, loader) and hands out the core engines wired to
//! them. Call [`Services::close`] when done.

use anyhow::{Context, Result};
use std::sync::Arc;

use docfusion_core::embedding::Embedder;
use docfusion_core::ingest::{IngestOptions, IngestionCoordinator};
use docfusion_core::search::HybridRetrievalEngine;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::lister::FsLister;
use crate::loader::FileLoader;
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

pub struct Services {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub embedder: Arc<dyn Embedder>,
    lister: Arc<FsLister>,
    loader: Arc<FileLoader>,
}

impl Services {
    /// Open the database (creating and migrating it if needed) and build the
    /// configured embedder.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.db).await?;
        migrate::run_migrations(&pool, &config.db)
            .await
            .context("Failed to prepare database schema")?;

        let embedder = create_embedder(&config.embedding)?;
        let lister = FsLister::new(&config.ingest).context("Invalid ingest glob pattern")?;

        Ok(Self {
            config: config.clone(),
            store: Arc::new(SqliteStore::new(pool, &config.db)),
            embedder,
            lister: Arc::new(lister),
            loader: Arc::new(FileLoader::new(config.ingest.max_tokens)),
        })
    }

    pub fn coordinator(&self, options: IngestOptions) -> IngestionCoordinator<SqliteStore> {
        IngestionCoordinator::new(
            self.store.clone(),
            self.lister.clone(),
            self.loader.clone(),
            self.embedder.clone(),
            options,
        )
    }

    pub fn engine(&self) -> HybridRetrievalEngine<SqliteStore> {
        HybridRetrievalEngine::new(self.store.clone(), self.config.retrieval.params())
    }

    pub async fn close(self) {
        self.store.close().await;
    }
}
