//! Scorer & Ranker (C7): combines a fused candidate's vector similarity with
//! three clinical signals into a single confidence, per §4.7. Pure CPU — no
//! `.await` anywhere in this module, enforcing the "scoring must not perform
//! I/O" invariant at the type level (plain `fn`, never `async fn`).

use std::collections::BTreeSet;

use crate::core::config::{ScoringWeights, TemporalFitConfig};
use crate::core::text::contains_word_boundary;
use crate::core::types::{Condition, PatientCase, ScoredCandidate, TemporalPattern};
use crate::retrieval::FusedCandidate;

/// Relative weight given to a rare-symptom match over a typical-symptom
/// match when computing symptom overlap: a rare symptom is more
/// discriminating, so a hit on one counts for more.
const RARE_SYMPTOM_WEIGHT: f64 = 1.5;
const TYPICAL_SYMPTOM_WEIGHT: f64 = 1.0;

/// Computes the four scoring signals and the weighted confidence for a
/// fused candidate against a patient case.
pub struct Scorer {
    weights: ScoringWeights,
    temporal: TemporalFitConfig,
    age_tolerance_years: u32,
}

impl Scorer {
    pub fn new(weights: ScoringWeights, temporal: TemporalFitConfig, age_tolerance_years: u32) -> Self {
        Self {
            weights,
            temporal,
            age_tolerance_years,
        }
    }

    /// Score one fused candidate against the case, per §4.7.
    pub fn score(&self, case: &PatientCase, candidate: &FusedCandidate) -> ScoredCandidate {
        let condition = &candidate.condition;
        let matched_symptoms = matched_symptoms(case, condition);
        let symptom_overlap = symptom_overlap(condition, &matched_symptoms);
        let temporal_fit = self.temporal_fit(case, condition, &matched_symptoms);
        let demographic_fit = demographic_fit(case, condition, self.age_tolerance_years);
        let red_flags_hit = matched_red_flags(case, condition);

        let confidence = self.weights.vector_similarity * candidate.vector_similarity
            + self.weights.symptom_overlap * symptom_overlap
            + self.weights.temporal_fit * temporal_fit
            + self.weights.demographic_fit * demographic_fit;

        ScoredCandidate {
            condition: condition.clone(),
            vector_similarity: candidate.vector_similarity,
            symptom_overlap,
            temporal_fit,
            demographic_fit,
            confidence,
            matched_symptoms,
            red_flags_hit,
        }
    }

    /// Score and rank a whole candidate set, truncating to
    /// `final_results_limit`. Tie-break: confidence, then symptom_overlap,
    /// then vector_similarity, all descending, then `condition_id` ascending.
    pub fn score_and_rank(
        &self,
        case: &PatientCase,
        candidates: &[FusedCandidate],
        final_results_limit: usize,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates.iter().map(|c| self.score(case, c)).collect();
        scored.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.symptom_overlap.partial_cmp(&a.symptom_overlap).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.vector_similarity.partial_cmp(&a.vector_similarity).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.condition.condition_id.cmp(&b.condition.condition_id))
        });
        scored.truncate(final_results_limit);
        scored
    }

    fn temporal_fit(&self, case: &PatientCase, condition: &Condition, matched: &BTreeSet<String>) -> f64 {
        let Some(pattern) = condition.temporal_pattern else {
            return self.temporal.neutral_score;
        };
        let Some(duration) = representative_duration_days(case, matched) else {
            return self.temporal.neutral_score;
        };

        let acute_max = self.temporal.acute_favoured_max_days as f64;
        let chronic_min = self.temporal.chronic_favoured_min_days as f64;
        let duration = duration as f64;
        let mismatch = self.temporal.mismatch_score;

        match pattern {
            TemporalPattern::Acute => {
                if duration <= acute_max {
                    1.0
                } else if duration >= chronic_min {
                    mismatch
                } else {
                    let fraction = (duration - acute_max) / (chronic_min - acute_max);
                    1.0 - fraction * (1.0 - mismatch)
                }
            }
            TemporalPattern::Chronic => {
                if duration >= chronic_min {
                    1.0
                } else if duration <= acute_max {
                    mismatch
                } else {
                    let fraction = (duration - acute_max) / (chronic_min - acute_max);
                    mismatch + fraction * (1.0 - mismatch)
                }
            }
        }
    }
}

/// Case symptom descriptions that word-boundary match one of the
/// condition's typical or rare symptoms, returned as the matched
/// condition-side phrases (§4.7's `matched_symptoms`).
fn matched_symptoms(case: &PatientCase, condition: &Condition) -> BTreeSet<String> {
    let mut matched = BTreeSet::new();
    for phrase in condition.typical_symptoms.iter().chain(condition.rare_symptoms.iter()) {
        if case.symptoms.iter().any(|s| contains_word_boundary(&s.description, phrase))
            || contains_word_boundary(&case.chief_complaint, phrase)
        {
            matched.insert(phrase.clone());
        }
    }
    matched
}

/// Weighted overlap: rare-symptom matches count for more than
/// typical-symptom matches, normalised against `max(|typical_symptoms|, 1)`
/// (the "expected" count, §4.7) rather than the full typical+rare set, so a
/// condition whose rare symptoms are all matched can still saturate at 1.0.
fn symptom_overlap(condition: &Condition, matched: &BTreeSet<String>) -> f64 {
    let expected = (condition.typical_symptoms.len() as f64).max(1.0);
    let matched_typical = condition
        .typical_symptoms
        .iter()
        .filter(|s| matched.contains(*s))
        .count() as f64
        * TYPICAL_SYMPTOM_WEIGHT;
    let matched_rare = condition
        .rare_symptoms
        .iter()
        .filter(|s| matched.contains(*s))
        .count() as f64
        * RARE_SYMPTOM_WEIGHT;
    ((matched_typical + matched_rare) / expected).clamp(0.0, 1.0)
}

/// Representative duration for the temporal-fit scorer: the longest
/// duration (days) among the case's symptoms whose descriptions matched
/// one of the condition's symptom phrases, falling back to the longest
/// across all reported symptoms if none matched.
fn representative_duration_days(case: &PatientCase, matched: &BTreeSet<String>) -> Option<u32> {
    let matching_durations: Vec<u32> = case
        .symptoms
        .iter()
        .filter(|s| matched.iter().any(|phrase| contains_word_boundary(&s.description, phrase)))
        .map(|s| s.duration_days)
        .collect();

    let durations = if matching_durations.is_empty() {
        case.symptoms.iter().map(|s| s.duration_days).collect::<Vec<_>>()
    } else {
        matching_durations
    };

    durations.into_iter().max()
}

/// Demographic fit: zero on a sex contradiction, otherwise `1.0` minus the
/// age distance as a fraction of the configured tolerance (distances beyond
/// tolerance are already excluded upstream by the retriever's pre-filter).
fn demographic_fit(case: &PatientCase, condition: &Condition, age_tolerance_years: u32) -> f64 {
    if condition.sex_predilection.contradicts(case.sex) {
        return 0.0;
    }
    match condition.typical_age_range {
        None => 1.0,
        Some(range) => {
            let distance = range.distance(case.age);
            let tolerance = age_tolerance_years.max(1) as f64;
            (1.0 - distance as f64 / tolerance).clamp(0.0, 1.0)
        }
    }
}

/// The condition's own red-flag symptoms (distinct from the global red-flag
/// lexicon) that the case text mentions, surfaced on the scored candidate so
/// callers can see which specific emergency symptoms drove a high-urgency
/// condition into the differential.
fn matched_red_flags(case: &PatientCase, condition: &Condition) -> BTreeSet<String> {
    condition
        .red_flag_symptoms
        .iter()
        .filter(|phrase| case.all_text().iter().any(|text| contains_word_boundary(text, phrase)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        AgeRange, ConditionSource, Frequency, PrevalenceBucket, Severity, Sex, SexPredilection, Symptom,
        SymptomList, Urgency,
    };
    use proptest::prelude::*;

    fn condition() -> Condition {
        Condition {
            condition_id: "hypothyroidism".into(),
            name: "Hypothyroidism".into(),
            icd_codes: vec!["E03".into()],
            typical_symptoms: vec!["fatigue".into(), "weight gain".into(), "cold intolerance".into()],
            rare_symptoms: vec!["myxedema coma".into()],
            red_flag_symptoms: vec!["myxedema coma".into()],
            recommended_tests: vec!["TSH".into()],
            recommended_specialist: "Endocrinology".into(),
            urgency_level: Urgency::Routine,
            prevalence_bucket: PrevalenceBucket::Common,
            typical_age_range: Some(AgeRange::new(20, 70)),
            sex_predilection: SexPredilection::Female,
            source: ConditionSource::Curated,
            temporal_pattern: Some(TemporalPattern::Chronic),
        }
    }

    fn case(symptoms: &[(&str, u32)], sex: Sex, age: u8) -> PatientCase {
        let symptoms: SymptomList = symptoms
            .iter()
            .map(|(desc, days)| Symptom {
                description: desc.to_string(),
                severity: Severity::Moderate,
                duration_days: *days,
                frequency: Frequency::Constant,
            })
            .collect::<Vec<_>>()
            .try_into()
            .unwrap();
        PatientCase {
            case_id: "c1".into(),
            age,
            sex,
            chief_complaint: "fatigue".into(),
            symptoms,
        }
    }

    fn candidate(condition: Condition, vector_similarity: f64) -> FusedCandidate {
        FusedCandidate {
            condition,
            rrf_score: 0.0,
            vector_similarity,
        }
    }

    #[test]
    fn full_symptom_match_and_chronic_duration_scores_highly() {
        let scorer = Scorer::new(ScoringWeights::default(), TemporalFitConfig::default(), 10);
        let case = case(&[("persistent fatigue", 60), ("weight gain", 60)], Sex::Female, 45);
        let scored = scorer.score(&case, &candidate(condition(), 0.9));
        assert!(scored.confidence > 0.7, "confidence was {}", scored.confidence);
        assert!(scored.matched_symptoms.contains("fatigue"));
    }

    #[test]
    fn sex_contradiction_zeroes_demographic_fit() {
        let scorer = Scorer::new(ScoringWeights::default(), TemporalFitConfig::default(), 10);
        let case = case(&[("fatigue", 60)], Sex::Male, 45);
        let scored = scorer.score(&case, &candidate(condition(), 0.9));
        assert_eq!(scored.demographic_fit, 0.0);
    }

    #[test]
    fn acute_duration_against_chronic_condition_is_penalised() {
        let scorer = Scorer::new(ScoringWeights::default(), TemporalFitConfig::default(), 10);
        let acute_case = case(&[("fatigue", 1)], Sex::Female, 45);
        let chronic_case = case(&[("fatigue", 60)], Sex::Female, 45);
        let acute_scored = scorer.score(&acute_case, &candidate(condition(), 0.9));
        let chronic_scored = scorer.score(&chronic_case, &candidate(condition(), 0.9));
        assert!(chronic_scored.temporal_fit > acute_scored.temporal_fit);
    }

    #[test]
    fn no_symptom_match_yields_zero_overlap() {
        let scorer = Scorer::new(ScoringWeights::default(), TemporalFitConfig::default(), 10);
        let case = case(&[("unrelated symptom", 5)], Sex::Female, 45);
        let scored = scorer.score(&case, &candidate(condition(), 0.5));
        assert_eq!(scored.symptom_overlap, 0.0);
        assert!(scored.matched_symptoms.is_empty());
    }

    #[test]
    fn rank_truncates_and_orders_by_confidence_descending() {
        let scorer = Scorer::new(ScoringWeights::default(), TemporalFitConfig::default(), 10);
        let case = case(&[("persistent fatigue", 60)], Sex::Female, 45);
        let mut low = condition();
        low.condition_id = "low".into();
        low.typical_symptoms = vec!["unrelated".into()];
        let candidates = vec![candidate(condition(), 0.9), candidate(low, 0.2)];
        let ranked = scorer.score_and_rank(&case, &candidates, 10);
        assert_eq!(ranked[0].condition.condition_id, "hypothyroidism");
    }

    #[test]
    fn confidence_is_bounded_to_unit_interval_for_unit_inputs() {
        let scorer = Scorer::new(ScoringWeights::default(), TemporalFitConfig::default(), 10);
        let case = case(&[("persistent fatigue", 60), ("weight gain", 60), ("cold intolerance", 60)], Sex::Female, 45);
        let scored = scorer.score(&case, &candidate(condition(), 1.0));
        assert!((0.0..=1.0).contains(&scored.confidence));
    }

    proptest! {
        /// §8: symptom_overlap is a [0, 1] signal regardless of how many
        /// typical/rare symptoms a condition declares or how many of each
        /// are matched.
        #[test]
        fn symptom_overlap_stays_in_unit_interval(
            typical_count in 0usize..8,
            rare_count in 0usize..8,
            matched_typical in 0usize..8,
            matched_rare in 0usize..8,
        ) {
            let typical_symptoms: Vec<String> = (0..typical_count).map(|i| format!("typical-{i}")).collect();
            let rare_symptoms: Vec<String> = (0..rare_count).map(|i| format!("rare-{i}")).collect();
            let mut matched = BTreeSet::new();
            matched.extend(typical_symptoms.iter().take(matched_typical.min(typical_count)).cloned());
            matched.extend(rare_symptoms.iter().take(matched_rare.min(rare_count)).cloned());

            let mut c = condition();
            c.typical_symptoms = typical_symptoms;
            c.rare_symptoms = rare_symptoms;

            let overlap = symptom_overlap(&c, &matched);
            prop_assert!((0.0..=1.0).contains(&overlap), "overlap {overlap} out of bounds");
        }

        /// §8: demographic_fit is a [0, 1] signal for any age/tolerance
        /// combination, and a contradicted sex always zeroes it.
        #[test]
        fn demographic_fit_stays_in_unit_interval(
            age in 0u8..120,
            range_low in 0u8..100,
            range_span in 0u8..60,
            tolerance in 1u32..80,
        ) {
            let mut c = condition();
            let high = range_low.saturating_add(range_span);
            c.typical_age_range = Some(AgeRange::new(range_low, high));
            let patient = case(&[("fatigue", 30)], Sex::Female, age);

            let fit = demographic_fit(&patient, &c, tolerance);
            prop_assert!((0.0..=1.0).contains(&fit), "demographic_fit {fit} out of bounds");

            let mut contradicted = c.clone();
            contradicted.sex_predilection = SexPredilection::Male;
            let female_patient = case(&[("fatigue", 30)], Sex::Female, age);
            prop_assert_eq!(demographic_fit(&female_patient, &contradicted, tolerance), 0.0);
        }
    }
}
