//! Triage Classifier (C8): maps an already-ranked differential and the
//! red-flag report onto an operational review tier, plus the capped,
//! deduplicated recommendation lists assembled from the differential.

use crate::core::config::TriageThresholds;
use crate::core::types::{ReviewTier, ScoredCandidate, Urgency};
use crate::redflag::RedFlagReport;

const MAX_RECOMMENDED_SPECIALISTS: usize = 5;
const MAX_RECOMMENDED_TESTS: usize = 10;
/// Candidates beyond this rank are not considered by the critical-urgency
/// override (§4.8: "critical urgency in top-3").
const CRITICAL_OVERRIDE_TOP_N: usize = 3;
/// Below this many candidates the differential is too thin to trust
/// automation, regardless of confidence.
const INSUFFICIENT_EVIDENCE_MIN_CANDIDATES: usize = 3;
const CRITICAL_OVERRIDE_MIN_CONFIDENCE: f64 = 0.40;
/// Recommendation lists (specialists, tests) are sourced from only the
/// top-3 candidates of the differential (§4.8), not the whole list.
const RECOMMENDATION_SOURCE_TOP_N: usize = 3;

/// Review tier plus the recommendation lists derived from a differential.
#[derive(Debug, Clone)]
pub struct TriageOutcome {
    pub review_tier: ReviewTier,
    pub requires_emergency_care: bool,
    pub recommended_specialists: Vec<String>,
    pub recommended_tests: Vec<String>,
}

/// Stateless classifier over the configured threshold table.
pub struct TriageClassifier {
    thresholds: TriageThresholds,
}

impl TriageClassifier {
    pub fn new(thresholds: TriageThresholds) -> Self {
        Self { thresholds }
    }

    /// Classify a ranked differential (already sorted by confidence
    /// descending) against the red-flag report, applying every override in
    /// §4.8 before assembling the recommendation lists.
    pub fn classify(&self, differential: &[ScoredCandidate], red_flags: &RedFlagReport) -> TriageOutcome {
        let top_confidence = differential.first().map(|c| c.confidence).unwrap_or(0.0);
        let mut tier = self.base_tier(top_confidence);
        let mut requires_emergency_care = false;

        if !red_flags.is_empty() {
            tier = tier.max(ReviewTier::Tier2PrimaryCare);
            requires_emergency_care = true;
        }

        if differential
            .iter()
            .take(CRITICAL_OVERRIDE_TOP_N)
            .any(|c| c.condition.urgency_level == Urgency::Critical && c.confidence >= CRITICAL_OVERRIDE_MIN_CONFIDENCE)
        {
            tier = tier.max(ReviewTier::Tier2PrimaryCare);
            requires_emergency_care = true;
        }

        if differential.len() < INSUFFICIENT_EVIDENCE_MIN_CANDIDATES {
            tier = tier.max(ReviewTier::Tier3Specialist);
        }

        TriageOutcome {
            review_tier: tier,
            requires_emergency_care,
            recommended_specialists: dedup_capped(
                differential
                    .iter()
                    .take(RECOMMENDATION_SOURCE_TOP_N)
                    .map(|c| c.condition.recommended_specialist.clone()),
                MAX_RECOMMENDED_SPECIALISTS,
            ),
            recommended_tests: dedup_capped(
                differential
                    .iter()
                    .take(RECOMMENDATION_SOURCE_TOP_N)
                    .flat_map(|c| c.condition.recommended_tests.iter().cloned()),
                MAX_RECOMMENDED_TESTS,
            ),
        }
    }

    fn base_tier(&self, confidence: f64) -> ReviewTier {
        if confidence >= self.thresholds.tier1_threshold {
            ReviewTier::Tier1Automated
        } else if confidence >= self.thresholds.tier2_threshold {
            ReviewTier::Tier2PrimaryCare
        } else if confidence >= self.thresholds.tier3_threshold {
            ReviewTier::Tier3Specialist
        } else {
            ReviewTier::Tier4Multidisciplinary
        }
    }
}

/// First-seen-order dedup, capped at `limit`.
fn dedup_capped(items: impl Iterator<Item = String>, limit: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if out.len() >= limit {
            break;
        }
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Condition, ConditionSource, PrevalenceBucket, SexPredilection};

    fn candidate(id: &str, confidence: f64, urgency: Urgency, specialist: &str, tests: &[&str]) -> ScoredCandidate {
        ScoredCandidate {
            condition: Condition {
                condition_id: id.to_string(),
                name: id.to_string(),
                icd_codes: vec![],
                typical_symptoms: vec!["fatigue".into()],
                rare_symptoms: vec![],
                red_flag_symptoms: vec![],
                recommended_tests: tests.iter().map(|t| t.to_string()).collect(),
                recommended_specialist: specialist.to_string(),
                urgency_level: urgency,
                prevalence_bucket: PrevalenceBucket::Common,
                typical_age_range: None,
                sex_predilection: SexPredilection::Any,
                source: ConditionSource::Curated,
                temporal_pattern: None,
            },
            vector_similarity: 0.8,
            symptom_overlap: 0.8,
            temporal_fit: 0.8,
            demographic_fit: 0.8,
            confidence,
            matched_symptoms: Default::default(),
            red_flags_hit: Default::default(),
        }
    }

    #[test]
    fn high_confidence_with_no_overrides_is_tier1() {
        let classifier = TriageClassifier::new(TriageThresholds::default());
        let differential = vec![
            candidate("a", 0.9, Urgency::Routine, "Endocrinology", &["TSH"]),
            candidate("b", 0.7, Urgency::Routine, "Internal Medicine", &["CBC"]),
            candidate("c", 0.5, Urgency::Routine, "Internal Medicine", &["CMP"]),
        ];
        let outcome = classifier.classify(&differential, &RedFlagReport::default());
        assert_eq!(outcome.review_tier, ReviewTier::Tier1Automated);
        assert!(!outcome.requires_emergency_care);
    }

    #[test]
    fn red_flag_forces_at_least_tier2() {
        let classifier = TriageClassifier::new(TriageThresholds::default());
        let differential = vec![
            candidate("a", 0.95, Urgency::Routine, "Endocrinology", &["TSH"]),
            candidate("b", 0.8, Urgency::Routine, "Internal Medicine", &["CBC"]),
            candidate("c", 0.7, Urgency::Routine, "Internal Medicine", &["CMP"]),
        ];
        let mut report = RedFlagReport::default();
        report.matched.insert("crushing chest pain".into());
        let outcome = classifier.classify(&differential, &report);
        assert!(outcome.review_tier >= ReviewTier::Tier2PrimaryCare);
        assert!(outcome.requires_emergency_care);
    }

    #[test]
    fn critical_urgency_in_top_three_forces_at_least_tier2() {
        let classifier = TriageClassifier::new(TriageThresholds::default());
        let differential = vec![
            candidate("a", 0.9, Urgency::Critical, "Cardiology", &["ECG"]),
            candidate("b", 0.5, Urgency::Routine, "Internal Medicine", &["CBC"]),
            candidate("c", 0.4, Urgency::Routine, "Internal Medicine", &["CMP"]),
        ];
        let outcome = classifier.classify(&differential, &RedFlagReport::default());
        assert!(outcome.review_tier >= ReviewTier::Tier2PrimaryCare);
        assert!(outcome.requires_emergency_care);
    }

    #[test]
    fn fewer_than_three_candidates_forces_at_least_tier3() {
        let classifier = TriageClassifier::new(TriageThresholds::default());
        let differential = vec![candidate("a", 0.9, Urgency::Routine, "Endocrinology", &["TSH"])];
        let outcome = classifier.classify(&differential, &RedFlagReport::default());
        assert!(outcome.review_tier >= ReviewTier::Tier3Specialist);
    }

    #[test]
    fn recommendations_are_deduped_and_capped_in_first_seen_order() {
        let classifier = TriageClassifier::new(TriageThresholds::default());
        let differential = vec![
            candidate("a", 0.9, Urgency::Routine, "Endocrinology", &["TSH", "CBC"]),
            candidate("b", 0.8, Urgency::Routine, "Endocrinology", &["CBC", "CMP"]),
            candidate("c", 0.7, Urgency::Routine, "Cardiology", &["ECG"]),
        ];
        let outcome = classifier.classify(&differential, &RedFlagReport::default());
        assert_eq!(outcome.recommended_specialists, vec!["Endocrinology", "Cardiology"]);
        assert_eq!(outcome.recommended_tests, vec!["TSH", "CBC", "CMP", "ECG"]);
    }

    #[test]
    fn recommendations_are_sourced_from_top_three_only() {
        let classifier = TriageClassifier::new(TriageThresholds::default());
        let differential = vec![
            candidate("a", 0.9, Urgency::Routine, "Endocrinology", &["TSH", "CBC"]),
            candidate("b", 0.8, Urgency::Routine, "Endocrinology", &["CBC", "CMP"]),
            candidate("c", 0.7, Urgency::Routine, "Cardiology", &["ECG"]),
            candidate("d", 0.6, Urgency::Routine, "Rheumatology", &["ANA"]),
        ];
        let outcome = classifier.classify(&differential, &RedFlagReport::default());
        assert_eq!(outcome.recommended_specialists, vec!["Endocrinology", "Cardiology"]);
        assert_eq!(outcome.recommended_tests, vec!["TSH", "CBC", "CMP", "ECG"]);
        assert!(!outcome.recommended_specialists.contains(&"Rheumatology".to_string()));
        assert!(!outcome.recommended_tests.contains(&"ANA".to_string()));
    }

    #[test]
    fn empty_differential_is_tier4() {
        let classifier = TriageClassifier::new(TriageThresholds::default());
        let outcome = classifier.classify(&[], &RedFlagReport::default());
        assert!(outcome.review_tier >= ReviewTier::Tier3Specialist);
    }
}
