//! Analysis Service (C9): the single injection point for the whole
//! pipeline. Constructed once at process start from the shared config and
//! the three upstream clients — "explicit service container… injected…
//! No lazy-on-first-use globals" (§9's redesign flag) — and exposes one
//! async entry point, [`AnalysisService::analyze`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use crate::cache::EmbeddingCache;
use crate::core::config::EngineConfig;
use crate::core::errors::{DiagnosisError, Result};
use crate::core::types::{DiagnosticResult, PatientCase, ReviewTier};
use crate::encoder::TextEncoder;
use crate::index::VectorStoreClient;
use crate::redflag::{RedFlagDetector, RedFlagLexicon, RedFlagReport};
use crate::retrieval::{CandidateRetriever, RetrievalOutcome};
use crate::scoring::Scorer;
use crate::triage::TriageClassifier;

/// Per-call overrides. Currently only the overall deadline; present as its
/// own type so future per-call knobs (e.g. a caller-supplied trace id) don't
/// change `analyze`'s signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    pub deadline: Option<Duration>,
}

/// Owns every long-lived collaborator the pipeline needs and exposes
/// [`AnalysisService::analyze`] as the only public operation.
pub struct AnalysisService {
    config: Arc<EngineConfig>,
    red_flag_detector: RedFlagDetector,
    retriever: CandidateRetriever,
    scorer: Scorer,
    triage: TriageClassifier,
}

impl AnalysisService {
    pub fn new(
        config: Arc<EngineConfig>,
        encoder: Arc<dyn TextEncoder>,
        index: Arc<dyn VectorStoreClient>,
        cache: Arc<EmbeddingCache>,
        red_flag_lexicon: &RedFlagLexicon,
    ) -> Result<Self> {
        let retriever = CandidateRetriever::new(
            encoder,
            index,
            cache,
            &config.index,
            config.retrieval,
            config.rrf,
            config.timeouts,
        );
        let scorer = Scorer::new(config.weights, config.temporal, config.retrieval.age_tolerance_years);
        let triage = TriageClassifier::new(config.triage);
        let red_flag_detector = RedFlagDetector::new(red_flag_lexicon)?;

        Ok(Self {
            config,
            red_flag_detector,
            retriever,
            scorer,
            triage,
        })
    }

    /// Run the full C5→C6→C7→C8 pipeline for one case and assemble a
    /// [`DiagnosticResult`]. Wrapped end-to-end in the configured (or
    /// per-call overridden) deadline; on expiry, a partial result is
    /// assembled from whatever completed, with `reasoning_summary` noting
    /// the truncation, unless nothing usable completed at all — in which
    /// case [`DiagnosisError::Timeout`] is returned.
    pub async fn analyze(&self, case: PatientCase, options: AnalysisOptions) -> Result<DiagnosticResult> {
        case.validate()?;
        let start = Instant::now();
        let deadline = options.deadline.unwrap_or(self.config.timeouts.overall);
        let span = tracing::info_span!("analyze", case_id = %case.case_id);

        let mut result = self.run_with_deadline(&case, deadline).instrument(span).await?;
        result.processing_time_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn run_with_deadline(&self, case: &PatientCase, deadline: Duration) -> Result<DiagnosticResult> {
        let (red_flags, candidates, degraded, timed_out) =
            match tokio::time::timeout(deadline, self.run_pipeline(case)).await {
                Ok((red_flags, outcome_result)) => {
                    let outcome = outcome_result?;
                    (red_flags, outcome.candidates, outcome.degraded, false)
                }
                Err(_) => {
                    tracing::warn!(case_id = %case.case_id, "analysis deadline exceeded, assembling partial result");
                    let red_flags = self.red_flag_detector.detect(case);
                    (red_flags, Vec::new(), true, true)
                }
            };

        if timed_out && candidates.is_empty() && red_flags.is_empty() {
            return Err(DiagnosisError::timeout(
                "analysis deadline exceeded before any usable result could be assembled",
            ));
        }

        let scored = self.scorer.score_and_rank(case, &candidates, self.config.retrieval.final_results_limit);
        let triage = self.triage.classify(&scored, &red_flags);
        let overall_confidence = scored.first().map(|c| c.confidence).unwrap_or(0.0);
        let primary_diagnosis = scored.first().cloned();

        Ok(DiagnosticResult {
            case_id: case.case_id.clone(),
            reasoning_summary: build_reasoning_summary(case, &scored, &triage.review_tier, degraded),
            primary_diagnosis,
            differential_diagnoses: scored,
            review_tier: triage.review_tier,
            overall_confidence,
            red_flags_detected: red_flags.matched,
            requires_emergency_care: triage.requires_emergency_care,
            recommended_specialists: triage.recommended_specialists,
            recommended_tests: triage.recommended_tests,
            processing_time_ms: 0,
        })
    }

    async fn run_pipeline(&self, case: &PatientCase) -> (RedFlagReport, Result<RetrievalOutcome>) {
        tokio::join!(
            async { self.red_flag_detector.detect(case) },
            self.retriever.retrieve(case),
        )
    }
}

/// Short, templated human-readable summary of how the result was assembled.
fn build_reasoning_summary(
    case: &PatientCase,
    scored: &[crate::core::types::ScoredCandidate],
    tier: &ReviewTier,
    degraded: bool,
) -> String {
    let mut summary = match scored.first() {
        Some(top) => format!(
            "Top candidate for case {} is {} (confidence {:.2}), triaged to {:?}.",
            case.case_id, top.condition.name, top.confidence, tier
        ),
        None => format!(
            "No candidates could be assembled for case {}; triaged to {:?}.",
            case.case_id, tier
        ),
    };
    if degraded {
        summary.push_str(" partial=true: one or more upstream sub-queries did not complete.");
    }
    summary
}
