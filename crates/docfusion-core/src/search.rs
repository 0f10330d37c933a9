//! Hybrid retrieval: a vector query and a lexical query fused by rank.
//!
//! The engine operates entirely through the [`Store`] trait. The caller
//! embeds the query text and passes both the text and its embedding; the
//! engine never talks to an embedder.
//!
//! # Algorithm
//!
//! 1. Vector query: the `channel_limit` nearest chunks (drawn from a pool of
//!    `candidate_pool` neighbours) by ascending distance.
//! 2. Lexical query: the `channel_limit` most relevant chunks by descending
//!    relevance.
//! 3. Both queries run concurrently; if either fails the search fails.
//! 4. [`fuse_hybrid`] combines the two rankings.
//! 5. Truncate to `top_k`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::fusion::{fuse_hybrid, FusionParams};
use crate::models::{LexicalHit, RankedHit, VectorHit};
use crate::store::Store;

/// Neighbours the vector index examines before the channel cap is applied.
pub const DEFAULT_CANDIDATE_POOL: usize = 64;
/// Results taken from each channel before fusion.
pub const DEFAULT_CHANNEL_LIMIT: usize = 10;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub candidate_pool: usize,
    pub channel_limit: usize,
    pub fusion: FusionParams,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            channel_limit: DEFAULT_CHANNEL_LIMIT,
            fusion: FusionParams::default(),
        }
    }
}

pub struct HybridRetrievalEngine<S: Store + ?Sized> {
    store: Arc<S>,
    params: RetrievalParams,
}

impl<S: Store + ?Sized> HybridRetrievalEngine<S> {
    pub fn new(store: Arc<S>, params: RetrievalParams) -> Self {
        Self { store, params }
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Return up to `top_k` chunks for a query, best first.
    ///
    /// Both channels empty yields an empty list, not an error.
    pub async fn search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RankedHit>> {
        let limit = self.params.channel_limit;
        let (mut vector, mut lexical) = futures::try_join!(
            self.store
                .vector_query(query_embedding, self.params.candidate_pool, limit),
            self.store.lexical_query(query_text, limit),
        )?;
        vector.truncate(limit);
        lexical.truncate(limit);
        debug!(
            vector = vector.len(),
            lexical = lexical.len(),
            "retrieval channels returned"
        );

        fuse_hits(&vector, &lexical, &self.params.fusion, top_k)
    }
}

/// Fuse already-ranked channel results into at most `top_k` [`RankedHit`]s.
///
/// Channel order is the rank: position 0 is rank 1.
pub fn fuse_hits(
    vector: &[VectorHit],
    lexical: &[LexicalHit],
    params: &FusionParams,
    top_k: usize,
) -> Result<Vec<RankedHit>> {
    let vector_ids: Vec<&str> = vector.iter().map(|h| h.chunk_id.as_str()).collect();
    let lexical_ids: Vec<&str> = lexical.iter().map(|h| h.chunk_id.as_str()).collect();
    let fused = fuse_hybrid(&vector_ids, &lexical_ids, params)?;

    let by_vector: HashMap<&str, &VectorHit> =
        vector.iter().map(|h| (h.chunk_id.as_str(), h)).collect();
    let by_lexical: HashMap<&str, &LexicalHit> =
        lexical.iter().map(|h| (h.chunk_id.as_str(), h)).collect();

    Ok(fused
        .into_iter()
        .take(top_k)
        .map(|f| {
            let v = by_vector.get(f.id.as_str());
            let l = by_lexical.get(f.id.as_str());
            let text = v
                .map(|h| h.text.clone())
                .or_else(|| l.map(|h| h.text.clone()))
                .unwrap_or_default();
            RankedHit {
                chunk_id: f.id,
                text,
                score: f.score,
                vector_rank: f.ranks[0],
                vector_distance: v.map(|h| h.distance),
                lexical_rank: f.ranks[1],
                lexical_relevance: l.map(|h| h.relevance),
            }
        })
        .collect())
}
