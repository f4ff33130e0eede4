//! Normalised-name dedup/merge across ontology sources (§4.3): curated rows
//! win scalar fields over HPO, which wins over ICD-10; list fields are
//! unioned across every row sharing a name, deduplicated in first-seen
//! order.

use crate::core::text::canonicalize;
use crate::core::types::{Condition, ConditionSource};
use crate::ingest::RawConditionRow;

/// Precedence used when two rows for the same condition disagree on a
/// scalar field: curated data is hand-reviewed, HPO is structured but
/// automated, ICD-10 descriptions are the weakest signal.
fn precedence(source: ConditionSource) -> u8 {
    match source {
        ConditionSource::Curated => 2,
        ConditionSource::Hpo => 1,
        ConditionSource::Icd10 => 0,
    }
}

fn slug(name: &str) -> String {
    canonicalize(name).replace([' ', '/'], "_")
}

fn dedup_in_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}

/// Merge raw, single-source rows into the canonical [`Condition`] records
/// the index stores, grouping by canonicalised name.
pub fn merge_rows(rows: Vec<RawConditionRow>) -> Vec<Condition> {
    use std::collections::HashMap;

    let mut groups: HashMap<String, Vec<RawConditionRow>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for row in rows {
        let key = canonicalize(&row.raw_name);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row);
    }

    order
        .into_iter()
        .map(|key| {
            let mut rows = groups.remove(&key).unwrap();
            rows.sort_by_key(|r| std::cmp::Reverse(precedence(r.source)));

            let name = rows[0].raw_name.clone();
            let source = rows[0].source;

            let icd_codes = dedup_in_order(rows.iter().flat_map(|r| r.icd_codes.iter().cloned()));
            let typical_symptoms = dedup_in_order(rows.iter().flat_map(|r| r.typical_symptoms.iter().cloned()));
            let rare_symptoms = dedup_in_order(rows.iter().flat_map(|r| r.rare_symptoms.iter().cloned()));
            let red_flag_symptoms = dedup_in_order(rows.iter().flat_map(|r| r.red_flag_symptoms.iter().cloned()));
            let recommended_tests = dedup_in_order(rows.iter().flat_map(|r| r.recommended_tests.iter().cloned()));

            let recommended_specialist = rows
                .iter()
                .find_map(|r| r.recommended_specialist.clone())
                .unwrap_or_else(|| "Internal Medicine".to_string());
            let urgency_level = rows.iter().find_map(|r| r.urgency_level).unwrap_or(crate::core::types::Urgency::Routine);
            let prevalence_bucket = rows
                .iter()
                .find_map(|r| r.prevalence_bucket)
                .unwrap_or(crate::core::types::PrevalenceBucket::Uncommon);
            let typical_age_range = rows.iter().find_map(|r| r.typical_age_range);
            let sex_predilection = rows
                .iter()
                .find_map(|r| r.sex_predilection)
                .unwrap_or(crate::core::types::SexPredilection::Any);
            let temporal_pattern = rows.iter().find_map(|r| r.temporal_pattern);

            Condition {
                condition_id: slug(&name),
                name,
                icd_codes,
                typical_symptoms,
                rare_symptoms,
                red_flag_symptoms,
                recommended_tests,
                recommended_specialist,
                urgency_level,
                prevalence_bucket,
                typical_age_range,
                sex_predilection,
                source,
                temporal_pattern,
            }
        })
        .collect()
}
