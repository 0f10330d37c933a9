//! Reciprocal Rank Fusion (RRF).
//!
//! Combines independently ranked lists into one ordering using only ranks,
//! so channels with incomparable score scales (vector distance, BM25
//! relevance) can be merged without normalization:
//!
//! ```text
//! score(id) = Σ_i  w_i / (k + r_i(id))      for every list i that contains id
//! ```
//!
//! `r_i` is the 1-based position in list `i`. `k` (default 60, Cormack et al.,
//! SIGIR 2009) flattens the gap between adjacent ranks.
//!
//! # Ordering
//!
//! Results are sorted by descending score. Equal scores are broken by walking
//! the lists in order: the first list in which *both* ids appear decides, and
//! the lower rank wins. A list missing either id contributes nothing. Ids that
//! are still tied are ordered ascending.
//!
//! With three or more lists that rule can be cyclic, so ties are ordered with
//! an insertion pass over each equal-score group rather than a comparison
//! sort. Groups start in first-seen order, which keeps the output
//! deterministic.
//!
//! For the hybrid engine the lists are `[vector, lexical]`, which means a
//! better vector rank wins a tie, then a better lexical rank.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

/// Standard RRF smoothing constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// Weights and smoothing constant for two-channel hybrid fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    pub k: f64,
    pub vector_weight: f64,
    pub lexical_weight: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            k: DEFAULT_RRF_K,
            vector_weight: 1.0,
            lexical_weight: 1.0,
        }
    }
}

/// One id in the fused ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedRank {
    pub id: String,
    pub score: f64,
    /// 1-based rank per input list, `None` where the id is absent.
    pub ranks: Vec<Option<usize>>,
}

/// Fuse any number of ranked id lists.
///
/// `lists[i]` is weighted by `weights[i]`. Fails with
/// [`Error::FusionInput`] if the list and weight counts differ, a weight or
/// `k` is negative or not finite, or an id repeats within one list.
pub fn reciprocal_rank_fusion<S: AsRef<str>>(
    lists: &[&[S]],
    weights: &[f64],
    k: f64,
) -> Result<Vec<FusedRank>> {
    if lists.len() != weights.len() {
        return Err(Error::FusionInput(format!(
            "{} ranked lists but {} weights",
            lists.len(),
            weights.len()
        )));
    }
    if !k.is_finite() || k < 0.0 {
        return Err(Error::FusionInput(format!(
            "k must be finite and >= 0, got {}",
            k
        )));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(Error::FusionInput(format!(
            "weights must be finite and >= 0, got {}",
            w
        )));
    }

    let channels = lists.len();
    let mut fused: Vec<FusedRank> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for (channel, (list, weight)) in lists.iter().zip(weights).enumerate() {
        let mut seen: HashSet<&str> = HashSet::with_capacity(list.len());
        for (pos, id) in list.iter().enumerate() {
            let id = id.as_ref();
            if !seen.insert(id) {
                return Err(Error::FusionInput(format!(
                    "id '{}' appears more than once in list {}",
                    id, channel
                )));
            }
            let rank = pos + 1;
            let slot = *index.entry(id).or_insert_with(|| {
                fused.push(FusedRank {
                    id: id.to_string(),
                    score: 0.0,
                    ranks: vec![None; channels],
                });
                fused.len() - 1
            });
            let entry = &mut fused[slot];
            entry.score += weight / (k + rank as f64);
            entry.ranks[channel] = Some(rank);
        }
    }

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut start = 0;
    while start < fused.len() {
        let score = fused[start].score;
        let len = fused[start..]
            .iter()
            .take_while(|f| f.score == score)
            .count();
        order_ties(&mut fused[start..start + len]);
        start += len;
    }
    Ok(fused)
}

/// Fuse a vector-channel and a lexical-channel list with [`FusionParams`].
pub fn fuse_hybrid<S: AsRef<str>>(
    vector: &[S],
    lexical: &[S],
    params: &FusionParams,
) -> Result<Vec<FusedRank>> {
    reciprocal_rank_fusion(
        &[vector, lexical],
        &[params.vector_weight, params.lexical_weight],
        params.k,
    )
}

fn order_ties(group: &mut [FusedRank]) {
    for i in 1..group.len() {
        let mut j = i;
        while j > 0 && compare_tied(&group[j - 1], &group[j]) == Ordering::Greater {
            group.swap(j - 1, j);
            j -= 1;
        }
    }
}

fn compare_tied(a: &FusedRank, b: &FusedRank) -> Ordering {
    break_tie(&a.ranks, &b.ranks).then_with(|| a.id.cmp(&b.id))
}

fn break_tie(a: &[Option<usize>], b: &[Option<usize>]) -> Ordering {
    for (ra, rb) in a.iter().zip(b) {
        if let (Some(ra), Some(rb)) = (ra, rb) {
            if ra != rb {
                return ra.cmp(rb);
            }
        }
    }
    Ordering::Equal
}
