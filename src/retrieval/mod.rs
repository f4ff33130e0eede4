//! Candidate Retriever (C6): runs the three sub-queries of §4.6 against the
//! vector index — broad, focused, and rare — and fuses them by reciprocal
//! rank fusion into a single ordered candidate set.
//!
//! Encoding of the two distinct sub-query vectors (broad text reused for the
//! rare sub-query) happens concurrently via `tokio::join!`, as does the
//! subsequent fan-out of the three `search` calls, each bounded by a
//! process-wide [`tokio::sync::Semaphore`] and wrapped in
//! [`tokio::time::timeout`] — matching §5's structured-concurrency redesign
//! flag over a manually-spawned future pool.

pub mod fuse;

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::cache::{cache_key, EmbeddingCache};
use crate::core::config::{IndexConfig, RetrievalLimits, RrfConfig, TimeoutConfig};
use crate::core::errors::{DiagnosisError, Result};
use crate::core::types::{Condition, PatientCase};
use crate::encoder::TextEncoder;
use crate::index::{Filter, SearchHit, VectorStoreClient};

pub use fuse::{reciprocal_rank_fusion, FusedCandidate, SubQueryResult};

/// Result of [`CandidateRetriever::retrieve`]: the fused candidates plus
/// whether one or two of the three sub-queries failed along the way.
/// `degraded` with a non-empty candidate set is still a usable result; the
/// caller surfaces it to the user rather than silently hiding the outage.
pub struct RetrievalOutcome {
    pub candidates: Vec<FusedCandidate>,
    pub degraded: bool,
}

/// Runs C6's three sub-queries against a configured index and fuses the
/// results. Constructed once and shared (`Arc`) across concurrent requests.
pub struct CandidateRetriever {
    encoder: Arc<dyn TextEncoder>,
    index: Arc<dyn VectorStoreClient>,
    cache: Arc<EmbeddingCache>,
    limits: RetrievalLimits,
    rrf: RrfConfig,
    timeouts: TimeoutConfig,
    search_permits: Semaphore,
}

impl CandidateRetriever {
    pub fn new(
        encoder: Arc<dyn TextEncoder>,
        index: Arc<dyn VectorStoreClient>,
        cache: Arc<EmbeddingCache>,
        index_config: &IndexConfig,
        limits: RetrievalLimits,
        rrf: RrfConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            encoder,
            index,
            cache,
            limits,
            rrf,
            timeouts,
            search_permits: Semaphore::new(index_config.concurrency_limit.max(1)),
        }
    }

    /// Run Q1 (broad), Q2 (focused), Q3 (rare), demographically pre-filter
    /// each list, then fuse by RRF. A sub-query that fails (timeout or index
    /// error) is dropped rather than failing the whole retrieval, unless
    /// every sub-query fails.
    pub async fn retrieve(&self, case: &PatientCase) -> Result<RetrievalOutcome> {
        let broad_text = broad_query_text(case);
        let focused_text = case.chief_complaint.clone();

        let (broad_vector, focused_vector) = tokio::join!(
            self.encode_cached(&broad_text),
            self.encode_cached(&focused_text),
        );
        let broad_vector = broad_vector?;
        let focused_vector = focused_vector?;

        let (broad_hits, focused_hits, rare_hits) = tokio::join!(
            self.search(&broad_vector, self.limits.broad_top_k, None),
            self.search(&focused_vector, self.limits.focused_top_k, None),
            self.search(&broad_vector, self.limits.rare_top_k, Some(Filter::IsRareDisease(true))),
        );

        let mut sub_queries = Vec::with_capacity(3);
        let mut failures = 0;

        match broad_hits {
            Ok(hits) => sub_queries.push(SubQueryResult {
                weight: self.rrf.weight_broad,
                hits: self.demographic_filter(hits, case),
            }),
            Err(_) => failures += 1,
        }
        match focused_hits {
            Ok(hits) => sub_queries.push(SubQueryResult {
                weight: self.rrf.weight_focused,
                hits: self.demographic_filter(hits, case),
            }),
            Err(_) => failures += 1,
        }
        match rare_hits {
            Ok(hits) => sub_queries.push(SubQueryResult {
                weight: self.rrf.weight_rare,
                hits: self.demographic_filter(hits, case),
            }),
            Err(_) => failures += 1,
        }

        if failures == 3 {
            return Err(DiagnosisError::index_unavailable(
                "all three candidate sub-queries failed",
            ));
        }

        let mut fused = reciprocal_rank_fusion(&sub_queries, &self.rrf);
        fused.truncate(self.limits.top_k_candidates);
        Ok(RetrievalOutcome {
            candidates: fused,
            degraded: failures > 0,
        })
    }

    async fn encode_cached(&self, text: &str) -> Result<Vec<f32>> {
        let key = cache_key(self.encoder.model_id(), text);
        if let Some(vector) = self.cache.get(&key) {
            return Ok(vector);
        }
        let vector = tokio::time::timeout(self.timeouts.encoder, self.encoder.encode(text))
            .await
            .map_err(|_| DiagnosisError::timeout("text encoder timed out"))??;
        self.cache.set(key, vector.clone());
        Ok(vector)
    }

    async fn search(&self, vector: &[f32], top_k: usize, filter: Option<Filter>) -> Result<Vec<SearchHit>> {
        let _permit = self
            .search_permits
            .acquire()
            .await
            .map_err(|_| DiagnosisError::internal("search semaphore closed"))?;
        tokio::time::timeout(self.timeouts.index_search, self.index.search(vector, top_k, filter.as_ref()))
            .await
            .map_err(|_| DiagnosisError::timeout("vector index search timed out"))?
    }

    fn demographic_filter(&self, hits: Vec<SearchHit>, case: &PatientCase) -> Vec<SearchHit> {
        hits.into_iter()
            .filter(|hit| passes_demographic_filter(&hit.condition, case, self.limits.age_tolerance_years))
            .collect()
    }
}

/// The broad sub-query text: chief complaint followed by every symptom
/// description, per §4.6's Q1 definition.
fn broad_query_text(case: &PatientCase) -> String {
    case.all_text().join(" ")
}

/// Demographic pre-filter (§4.6): a condition with a sex predilection that
/// contradicts the patient's sex, or a typical age range further than the
/// configured tolerance from the patient's age, is dropped before fusion.
fn passes_demographic_filter(condition: &Condition, case: &PatientCase, tolerance_years: u32) -> bool {
    if condition.sex_predilection.contradicts(case.sex) {
        return false;
    }
    match condition.typical_age_range {
        None => true,
        Some(range) => range.distance(case.age) <= tolerance_years,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::core::types::{
        AgeRange, ConditionSource, Frequency, PrevalenceBucket, Severity, Sex, SexPredilection, Symptom,
        SymptomList, Urgency,
    };
    use crate::index::{Distance, InMemoryVectorStore, IndexPoint};
    use async_trait::async_trait;

    struct KeywordEncoder;

    #[async_trait]
    impl TextEncoder for KeywordEncoder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            let lowered = text.to_lowercase();
            let mut vector = vec![0.0f32; 3];
            if lowered.contains("fatigue") {
                vector[0] = 1.0;
            }
            if lowered.contains("chest pain") {
                vector[1] = 1.0;
            }
            if lowered.contains("joint") {
                vector[2] = 1.0;
            }
            if vector.iter().all(|x| *x == 0.0) {
                vector[0] = 0.1;
            }
            Ok(vector)
        }

        async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.encode(t).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_id(&self) -> &str {
            "keyword-stub"
        }
    }

    fn condition(id: &str, rare: bool, sex: SexPredilection, age_range: Option<AgeRange>) -> Condition {
        Condition {
            condition_id: id.to_string(),
            name: id.to_string(),
            icd_codes: vec![],
            typical_symptoms: vec!["fatigue".to_string()],
            rare_symptoms: vec![],
            red_flag_symptoms: vec![],
            recommended_tests: vec![],
            recommended_specialist: "Internal Medicine".to_string(),
            urgency_level: Urgency::Routine,
            prevalence_bucket: if rare { PrevalenceBucket::Rare } else { PrevalenceBucket::Common },
            typical_age_range: age_range,
            sex_predilection: sex,
            source: ConditionSource::Curated,
            temporal_pattern: None,
        }
    }

    fn case(chief_complaint: &str, age: u8, sex: Sex) -> PatientCase {
        let symptoms: SymptomList = vec![Symptom {
            description: "fatigue".to_string(),
            severity: Severity::Moderate,
            duration_days: 10,
            frequency: Frequency::Constant,
        }]
        .try_into()
        .unwrap();
        PatientCase {
            case_id: "case".into(),
            age,
            sex,
            chief_complaint: chief_complaint.to_string(),
            symptoms,
        }
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.ensure_collection(3, Distance::Cosine).await.unwrap();
        store
            .upsert(vec![
                IndexPoint {
                    condition: condition("hypothyroidism", false, SexPredilection::Any, Some(AgeRange::new(20, 70))),
                    vector: vec![1.0, 0.0, 0.0],
                },
                IndexPoint {
                    condition: condition("mi", false, SexPredilection::Any, None),
                    vector: vec![0.0, 1.0, 0.0],
                },
                IndexPoint {
                    condition: condition("zebra_disease", true, SexPredilection::Any, None),
                    vector: vec![1.0, 0.0, 0.1],
                },
                IndexPoint {
                    condition: condition("prostate_only", false, SexPredilection::Male, None),
                    vector: vec![1.0, 0.0, 0.0],
                },
            ])
            .await
            .unwrap();
        store
    }

    fn retriever(store: Arc<InMemoryVectorStore>) -> CandidateRetriever {
        CandidateRetriever::new(
            Arc::new(KeywordEncoder),
            store,
            Arc::new(EmbeddingCache::new(CacheConfig::default())),
            &IndexConfig::default(),
            RetrievalLimits::default(),
            RrfConfig::default(),
            TimeoutConfig::default(),
        )
    }

    #[tokio::test]
    async fn retrieve_returns_fused_candidates_ordered_by_rrf_score() {
        let store = seeded_store().await;
        let retriever = retriever(store);
        let case = case("persistent fatigue", 40, Sex::Female);
        let outcome = retriever.retrieve(&case).await.unwrap();
        assert!(!outcome.candidates.is_empty());
        assert_eq!(outcome.candidates[0].condition.condition_id, "hypothyroidism");
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn sex_contradicting_candidate_is_excluded() {
        let store = seeded_store().await;
        let retriever = retriever(store);
        let case = case("persistent fatigue", 40, Sex::Female);
        let outcome = retriever.retrieve(&case).await.unwrap();
        assert!(!outcome.candidates.iter().any(|c| c.condition.condition_id == "prostate_only"));
    }

    #[tokio::test]
    async fn out_of_age_range_candidate_is_excluded() {
        let store = seeded_store().await;
        let retriever = retriever(store);
        let case = case("persistent fatigue", 5, Sex::Male);
        let outcome = retriever.retrieve(&case).await.unwrap();
        assert!(!outcome.candidates.iter().any(|c| c.condition.condition_id == "hypothyroidism"));
    }

    #[tokio::test]
    async fn rare_sub_query_surfaces_rare_disease_even_when_low_ranked_in_broad() {
        let store = seeded_store().await;
        let retriever = retriever(store);
        let case = case("persistent fatigue", 40, Sex::Male);
        let outcome = retriever.retrieve(&case).await.unwrap();
        assert!(outcome.candidates.iter().any(|c| c.condition.condition_id == "zebra_disease"));
    }

    struct FlakyStore {
        inner: Arc<InMemoryVectorStore>,
        fails_top_k: usize,
    }

    #[async_trait]
    impl VectorStoreClient for FlakyStore {
        async fn ensure_collection(&self, dim: usize, distance: Distance) -> Result<()> {
            self.inner.ensure_collection(dim, distance).await
        }

        async fn upsert(&self, points: Vec<crate::index::IndexPoint>) -> Result<()> {
            self.inner.upsert(points).await
        }

        async fn search(&self, query_vector: &[f32], top_k: usize, filter: Option<&Filter>) -> Result<Vec<SearchHit>> {
            if top_k == self.fails_top_k {
                return Err(DiagnosisError::index_unavailable("simulated sub-query outage"));
            }
            self.inner.search(query_vector, top_k, filter).await
        }

        async fn count(&self) -> Result<usize> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn one_failed_sub_query_still_yields_a_usable_differential() {
        let store = seeded_store().await;
        let limits = RetrievalLimits::default();
        let flaky = Arc::new(FlakyStore {
            inner: store,
            fails_top_k: limits.focused_top_k,
        });
        let retriever = CandidateRetriever::new(
            Arc::new(KeywordEncoder),
            flaky,
            Arc::new(EmbeddingCache::new(CacheConfig::default())),
            &IndexConfig::default(),
            limits,
            RrfConfig::default(),
            TimeoutConfig::default(),
        );
        let case = case("persistent fatigue", 40, Sex::Female);
        let outcome = retriever.retrieve(&case).await.unwrap();
        assert!(outcome.degraded);
        assert!(!outcome.candidates.is_empty());
    }

    #[test]
    fn passes_demographic_filter_rejects_sex_contradiction() {
        let condition = condition("c", false, SexPredilection::Female, None);
        let case = case("pain", 30, Sex::Male);
        assert!(!passes_demographic_filter(&condition, &case, 10));
    }

    #[test]
    fn passes_demographic_filter_accepts_within_tolerance() {
        let condition = condition("c", false, SexPredilection::Any, Some(AgeRange::new(20, 30)));
        let case = case("pain", 35, Sex::Male);
        assert!(passes_demographic_filter(&condition, &case, 10));
        assert!(!passes_demographic_filter(&condition, &case, 2));
    }
}
