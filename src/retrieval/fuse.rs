//! Reciprocal rank fusion (§4.6): a pure function over three ranked result
//! lists, independent of the order in which the underlying sub-queries
//! complete — kept separate from [`super::CandidateRetriever`] so fusion
//! order-independence can be tested directly without spinning up an async
//! pipeline.

use std::collections::HashMap;

use crate::core::config::RrfConfig;
use crate::core::types::Condition;
use crate::index::SearchHit;

/// One sub-query's labelled, ranked result list.
pub struct SubQueryResult {
    pub weight: f64,
    pub hits: Vec<SearchHit>,
}

/// A condition fused across sub-queries, carrying its RRF score and the
/// best per-query cosine similarity seen for it.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub condition: Condition,
    pub rrf_score: f64,
    pub vector_similarity: f64,
}

/// Fuse several ranked, weighted result lists into a single ordered set of
/// candidates using the RRF variant in §4.6:
/// `rrf_score(c) = Σ_q [ w_q · 1/(k + rank_q(c)) ]`, `rank_q` 1-indexed.
///
/// Ties break by descending `vector_similarity`, then ascending
/// `condition_id`, matching §4.6's documented tie-break.
pub fn reciprocal_rank_fusion(results: &[SubQueryResult], config: &RrfConfig) -> Vec<FusedCandidate> {
    let mut accum: HashMap<String, FusedCandidate> = HashMap::new();

    for result in results {
        for (idx, hit) in result.hits.iter().enumerate() {
            let rank = (idx + 1) as f64;
            let contribution = result.weight / (config.k + rank);
            let id = hit.condition.condition_id.clone();

            accum
                .entry(id)
                .and_modify(|candidate| {
                    candidate.rrf_score += contribution;
                    if hit.score > candidate.vector_similarity {
                        candidate.vector_similarity = hit.score;
                    }
                })
                .or_insert_with(|| FusedCandidate {
                    condition: hit.condition.clone(),
                    rrf_score: contribution,
                    vector_similarity: hit.score,
                });
        }
    }

    let mut fused: Vec<FusedCandidate> = accum.into_values().collect();
    fused.sort_by(|a, b| {
        b.rrf_score
            .partial_cmp(&a.rrf_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.vector_similarity.partial_cmp(&a.vector_similarity).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.condition.condition_id.cmp(&b.condition.condition_id))
    });
    fused
}
