//! `query` and `files` commands.

use anyhow::Result;
use serde::Serialize;

use docfusion_core::embedding::Embedder;
use docfusion_core::models::RankedHit;
use docfusion_core::store::Store;

use crate::app::Services;
use crate::config::Config;

/// Characters of chunk text shown per result.
pub const DISPLAY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct QueryResult<'a> {
    text: String,
    score: f64,
    chunk_id: &'a str,
}

pub async fn run_query(
    config: &Config,
    text: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);

    let services = Services::open(config).await?;
    let result = async {
        let embedding = services.embedder.embed_query(text).await?;
        let hits = services.engine().search(text, &embedding, top_k).await?;
        anyhow::Ok(hits)
    }
    .await;
    services.close().await;
    let hits = result?;

    if json {
        let results: Vec<QueryResult> = hits
            .iter()
            .map(|h| QueryResult {
                text: display_text(&h.text),
                score: h.score,
                chunk_id: &h.chunk_id,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, hit.score, display_text(&hit.text));
        println!("    {}", channel_summary(hit));
    }
    Ok(())
}

/// First [`DISPLAY_CHARS`] characters with newlines flattened to spaces.
pub fn display_text(text: &str) -> String {
    text.chars()
        .take(DISPLAY_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

fn channel_summary(hit: &RankedHit) -> String {
    let vector = match (hit.vector_rank, hit.vector_distance) {
        (Some(rank), Some(d)) => format!("vector #{} (distance {:.4})", rank, d),
        _ => "vector -".to_string(),
    };
    let lexical = match (hit.lexical_rank, hit.lexical_relevance) {
        (Some(rank), Some(r)) => format!("lexical #{} (relevance {:.4})", rank, r),
        _ => "lexical -".to_string(),
    };
    format!("{}, {}", vector, lexical)
}

pub async fn run_files(config: &Config, json: bool) -> Result<()> {
    let services = Services::open(config).await?;
    let result = services.store.list_files().await;
    services.close().await;
    let files = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }
    if files.is_empty() {
        println!("No files.");
        return Ok(());
    }
    for file in &files {
        println!("{}  {} chunks  {}", file.filename, file.chunk_ids.len(), file.id);
    }
    Ok(())
}
