//! # docfusion CLI
//!
//! ## Usage
//!
//! ```bash
//! docfusion --config ./config/docfusion.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docfusion init` | Create the SQLite database and run schema migrations |
//! | `docfusion ingest [dir]` | Ingest every file not yet stored |
//! | `docfusion query "<text>"` | Hybrid search |
//! | `docfusion delete <filename>` | Delete a file and its chunks |
//! | `docfusion files` | List stored files |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docfusion::{config, db, ingest, migrate, search};

/// docfusion: hybrid vector + lexical document search with rank fusion.
#[derive(Parser)]
#[command(
    name = "docfusion",
    about = "docfusion: hybrid vector + lexical document search with reciprocal rank fusion",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(
        long,
        global = true,
        env = "DOCFUSION_CONFIG",
        default_value = "./config/docfusion.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Ingest documents from a directory.
    ///
    /// Files are keyed by basename; names already stored are skipped.
    Ingest {
        /// Directory to ingest. Defaults to `ingest.root` from the config.
        dir: Option<PathBuf>,

        /// Files processed concurrently (overrides `ingest.concurrency`).
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search stored chunks.
    Query {
        /// Query text.
        text: String,

        /// Number of results (defaults to `retrieval.default_top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored file and all of its chunks.
    Delete {
        /// Filename (basename) as stored.
        filename: String,
    },

    /// List stored files.
    Files {
        /// Print the list as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool, &cfg.db).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            dir,
            concurrency,
            json,
        } => {
            ingest::run_ingest(&cfg, dir, concurrency, json).await?;
        }
        Commands::Query { text, top_k, json } => {
            search::run_query(&cfg, &text, top_k, json).await?;
        }
        Commands::Delete { filename } => {
            ingest::run_delete(&cfg, &filename).await?;
        }
        Commands::Files { json } => {
            search::run_files(&cfg, json).await?;
        }
    }

    Ok(())
}
