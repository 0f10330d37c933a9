//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/docfusion.sqlite"
//!
//! [embedding]
//! provider = "hash"      # hash | openai | ollama | local
//! dims = 256
//!
//! [retrieval]
//! rrf_k = 60.0
//!
//! [ingest]
//! root = "./docs"
//! ```
//!
//! Every section except `[db]` may be omitted.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docfusion_core::fusion::FusionParams;
use docfusion_core::ingest::IngestOptions;
use docfusion_core::search::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_files_table")]
    pub files_table: String,
    #[serde(default = "default_chunks_table")]
    pub chunks_table: String,
}

fn default_files_table() -> String {
    "files".to_string()
}
fn default_chunks_table() -> String {
    "file_chunks".to_string()
}

impl DbConfig {
    /// Name of the FTS5 index over the chunk table.
    pub fn fts_table(&self) -> String {
        format!("{}_fts", self.chunks_table)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Model download cache for the `local` provider.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            cache_dir: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    #[serde(default = "default_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,
    #[serde(default = "default_channel_limit")]
    pub channel_limit: usize,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            vector_weight: default_weight(),
            lexical_weight: default_weight(),
            candidate_pool: default_candidate_pool(),
            channel_limit: default_channel_limit(),
            default_top_k: default_top_k(),
        }
    }
}

fn default_rrf_k() -> f64 {
    docfusion_core::fusion::DEFAULT_RRF_K
}
fn default_weight() -> f64 {
    1.0
}
fn default_candidate_pool() -> usize {
    docfusion_core::search::DEFAULT_CANDIDATE_POOL
}
fn default_channel_limit() -> usize {
    docfusion_core::search::DEFAULT_CHANNEL_LIMIT
}
fn default_top_k() -> usize {
    4
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            candidate_pool: self.candidate_pool,
            channel_limit: self.channel_limit,
            fusion: FusionParams {
                k: self.rrf_k,
                vector_weight: self.vector_weight,
                lexical_weight: self.lexical_weight,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Directory used when `ingest` is run without one.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            concurrency: default_concurrency(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}
fn default_concurrency() -> usize {
    docfusion_core::ingest::DEFAULT_CONCURRENCY
}
fn default_max_tokens() -> usize {
    700
}

impl IngestConfig {
    pub fn options(&self) -> IngestOptions {
        IngestOptions {
            concurrency: self.concurrency,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Table names are spliced into SQL
    for (key, name) in [
        ("db.files_table", &config.db.files_table),
        ("db.chunks_table", &config.db.chunks_table),
    ] {
        if !is_sql_identifier(name) {
            bail!(
                "{} must be a plain SQL identifier ([A-Za-z_][A-Za-z0-9_]*), got '{}'",
                key,
                name
            );
        }
    }
    if config.db.files_table == config.db.chunks_table {
        bail!("db.files_table and db.chunks_table must differ");
    }

    let r = &config.retrieval;
    if !r.rrf_k.is_finite() || r.rrf_k < 0.0 {
        bail!("retrieval.rrf_k must be a finite number >= 0");
    }
    if !r.vector_weight.is_finite()
        || r.vector_weight < 0.0
        || !r.lexical_weight.is_finite()
        || r.lexical_weight < 0.0
    {
        bail!("retrieval weights must be finite numbers >= 0");
    }
    if r.channel_limit < 1 {
        bail!("retrieval.channel_limit must be >= 1");
    }
    if r.candidate_pool < r.channel_limit {
        bail!("retrieval.candidate_pool must be >= retrieval.channel_limit");
    }
    if r.default_top_k < 1 {
        bail!("retrieval.default_top_k must be >= 1");
    }

    if config.ingest.concurrency < 1 {
        bail!("ingest.concurrency must be >= 1");
    }
    if config.ingest.max_tokens == 0 {
        bail!("ingest.max_tokens must be > 0");
    }

    let e = &config.embedding;
    match e.provider.as_str() {
        "hash" | "local" => {}
        "openai" | "ollama" => {
            if e.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    e.provider
                );
            }
            if e.dims.is_none() {
                bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    e.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
            other
        ),
    }
    if e.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if e.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    Ok(config)
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
