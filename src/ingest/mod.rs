//! Ingest Pipeline (C3): reads raw condition rows from each ontology
//! source, merges them into canonical [`Condition`] records, and builds the
//! text that gets embedded and upserted into the vector index.

pub mod merge;
pub mod sources;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::core::types::{Condition, ConditionSource};

pub use merge::merge_rows;
pub use sources::{CuratedSource, HpoSource, Icd10Source, KeywordLexicon};

/// A single-source row, before cross-source merge.
#[derive(Debug, Clone)]
pub struct RawConditionRow {
    pub source: ConditionSource,
    pub raw_name: String,
    pub icd_codes: Vec<String>,
    pub typical_symptoms: Vec<String>,
    pub rare_symptoms: Vec<String>,
    pub red_flag_symptoms: Vec<String>,
    pub recommended_tests: Vec<String>,
    pub recommended_specialist: Option<String>,
    pub urgency_level: Option<crate::core::types::Urgency>,
    pub prevalence_bucket: Option<crate::core::types::PrevalenceBucket>,
    pub typical_age_range: Option<crate::core::types::AgeRange>,
    pub sex_predilection: Option<crate::core::types::SexPredilection>,
    pub temporal_pattern: Option<crate::core::types::TemporalPattern>,
}

/// Contract every ontology reader implements (§4.3). Reading is plain
/// synchronous I/O (file or in-memory records); the pipeline itself owns
/// any `async` boundary with the vector store.
pub trait OntologySource {
    fn source(&self) -> ConditionSource;
    fn read(&self) -> Result<Vec<RawConditionRow>>;
}

/// Restart marker for one source: the row index of the last row
/// successfully processed. Persisted by the caller (e.g. the CLI binary) as
/// JSON next to the source file; the pipeline only consumes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IngestCheckpoint {
    pub source: ConditionSource,
    pub last_row: usize,
}

/// Per-source counters from one ingest run, for observability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCounts {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_skipped_checkpoint: usize,
}

/// Summary of a full ingest run across every configured source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub hpo: SourceCounts,
    pub icd10: SourceCounts,
    pub curated: SourceCounts,
    pub conditions_merged: usize,
}

/// Build the exact embedding-text template from §4.3:
/// `"{name}. Typical symptoms: {...}. Rare symptoms: {...}."`, omitting a
/// sentence entirely when its symptom list is empty.
pub fn build_embedding_text(name: &str, typical_symptoms: &[String], rare_symptoms: &[String]) -> String {
    let mut parts = vec![format!("{name}.")];
    if !typical_symptoms.is_empty() {
        parts.push(format!("Typical symptoms: {}.", typical_symptoms.join(", ")));
    }
    if !rare_symptoms.is_empty() {
        parts.push(format!("Rare symptoms: {}.", rare_symptoms.join(", ")));
    }
    parts.join(" ")
}

/// Orchestrates the three ontology sources: reads each (skipping rows
/// already past its checkpoint), merges the results, and reports counters.
/// A source read error is logged and that source is skipped entirely
/// (partial ingest); the caller decides whether a partial ingest is
/// acceptable to upsert.
pub struct IngestPipeline {
    hpo: Option<HpoSource>,
    icd10: Option<Icd10Source>,
    curated: Option<CuratedSource>,
}

impl IngestPipeline {
    pub fn new(hpo: Option<HpoSource>, icd10: Option<Icd10Source>, curated: Option<CuratedSource>) -> Self {
        Self { hpo, icd10, curated }
    }

    /// Run every configured source, merge their rows, and return the
    /// canonical conditions plus a report. `checkpoints` maps source to the
    /// row index already processed in a prior run; rows at or before that
    /// index are skipped.
    pub fn run(&self, checkpoints: &[IngestCheckpoint]) -> (Vec<Condition>, IngestReport) {
        let mut all_rows = Vec::new();
        let mut report = IngestReport::default();

        if let Some(hpo) = &self.hpo {
            let checkpoint = checkpoint_for(checkpoints, ConditionSource::Hpo);
            match hpo.read() {
                Ok(rows) => {
                    report.hpo = apply_checkpoint(rows, checkpoint, &mut all_rows);
                }
                Err(e) => {
                    tracing::warn!(%e, "HPO source read failed, skipping");
                }
            }
        }

        if let Some(icd10) = &self.icd10 {
            let checkpoint = checkpoint_for(checkpoints, ConditionSource::Icd10);
            match icd10.read() {
                Ok(rows) => {
                    report.icd10 = apply_checkpoint(rows, checkpoint, &mut all_rows);
                }
                Err(e) => {
                    tracing::warn!(%e, "ICD-10 source read failed, skipping");
                }
            }
        }

        if let Some(curated) = &self.curated {
            let checkpoint = checkpoint_for(checkpoints, ConditionSource::Curated);
            match curated.read() {
                Ok(rows) => {
                    report.curated = apply_checkpoint(rows, checkpoint, &mut all_rows);
                }
                Err(e) => {
                    tracing::warn!(%e, "curated source read failed, skipping");
                }
            }
        }

        let merged = merge_rows(all_rows);
        report.conditions_merged = merged.len();
        tracing::info!(
            conditions = merged.len(),
            hpo_kept = report.hpo.rows_kept,
            icd10_kept = report.icd10.rows_kept,
            curated_kept = report.curated.rows_kept,
            "ingest run complete"
        );
        (merged, report)
    }
}

fn checkpoint_for(checkpoints: &[IngestCheckpoint], source: ConditionSource) -> usize {
    checkpoints
        .iter()
        .find(|c| c.source == source)
        .map(|c| c.last_row)
        .unwrap_or(0)
}

fn apply_checkpoint(rows: Vec<RawConditionRow>, checkpoint: usize, out: &mut Vec<RawConditionRow>) -> SourceCounts {
    let rows_read = rows.len();
    let mut kept = 0;
    let mut skipped = 0;
    for (idx, row) in rows.into_iter().enumerate() {
        if idx < checkpoint {
            skipped += 1;
            continue;
        }
        kept += 1;
        out.push(row);
    }
    SourceCounts {
        rows_read,
        rows_kept: kept,
        rows_skipped_checkpoint: skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::IngestConfig;
    use crate::ingest::sources::{CuratedConditionRow, HpoDiseaseRecord};
    use crate::core::types::{PrevalenceBucket, SexPredilection, Urgency};

    #[test]
    fn build_embedding_text_omits_empty_sections() {
        let text = build_embedding_text("Hypothyroidism", &["fatigue".to_string()], &[]);
        assert_eq!(text, "Hypothyroidism. Typical symptoms: fatigue.");
    }

    #[test]
    fn build_embedding_text_includes_both_sections_when_present() {
        let text = build_embedding_text(
            "Hypothyroidism",
            &["fatigue".to_string()],
            &["myxedema coma".to_string()],
        );
        assert_eq!(text, "Hypothyroidism. Typical symptoms: fatigue. Rare symptoms: myxedema coma.");
    }

    #[test]
    fn pipeline_merges_across_all_three_sources() {
        let hpo = HpoSource::new(
            vec![HpoDiseaseRecord {
                disease_name: "Hypothyroidism".to_string(),
                hpo_terms: vec!["fatigue".to_string(), "weight gain".to_string(), "swelling".to_string()],
            }],
            IngestConfig { min_phenotypes: 2 },
            KeywordLexicon::default(),
        );
        let curated = CuratedSource::new(vec![CuratedConditionRow {
            name: "Hypothyroidism".to_string(),
            icd_codes: vec!["E03".to_string()],
            typical_symptoms: vec!["cold intolerance".to_string()],
            rare_symptoms: vec![],
            red_flag_symptoms: vec![],
            recommended_tests: vec!["TSH".to_string()],
            recommended_specialist: "Endocrinology".to_string(),
            urgency_level: Urgency::Routine,
            prevalence_bucket: PrevalenceBucket::Common,
            typical_age_range: None,
            sex_predilection: SexPredilection::Female,
            temporal_pattern: None,
        }]);

        let pipeline = IngestPipeline::new(Some(hpo), None, Some(curated));
        let (conditions, report) = pipeline.run(&[]);

        assert_eq!(conditions.len(), 1);
        assert_eq!(report.conditions_merged, 1);
        assert_eq!(report.hpo.rows_kept, 1);
        assert_eq!(report.curated.rows_kept, 1);
        assert!(conditions[0].typical_symptoms.contains(&"cold intolerance".to_string()));
        assert_eq!(conditions[0].recommended_specialist, "Endocrinology");
    }

    #[test]
    fn checkpoint_skips_already_processed_rows() {
        let curated = CuratedSource::new(vec![
            CuratedConditionRow {
                name: "Condition A".to_string(),
                icd_codes: vec![],
                typical_symptoms: vec!["pain".to_string()],
                rare_symptoms: vec![],
                red_flag_symptoms: vec![],
                recommended_tests: vec![],
                recommended_specialist: "Internal Medicine".to_string(),
                urgency_level: Urgency::Routine,
                prevalence_bucket: PrevalenceBucket::Common,
                typical_age_range: None,
                sex_predilection: SexPredilection::Any,
                temporal_pattern: None,
            },
            CuratedConditionRow {
                name: "Condition B".to_string(),
                icd_codes: vec![],
                typical_symptoms: vec!["fever".to_string()],
                rare_symptoms: vec![],
                red_flag_symptoms: vec![],
                recommended_tests: vec![],
                recommended_specialist: "Internal Medicine".to_string(),
                urgency_level: Urgency::Routine,
                prevalence_bucket: PrevalenceBucket::Common,
                typical_age_range: None,
                sex_predilection: SexPredilection::Any,
                temporal_pattern: None,
            },
        ]);
        let pipeline = IngestPipeline::new(None, None, Some(curated));
        let (conditions, report) = pipeline.run(&[IngestCheckpoint { source: ConditionSource::Curated, last_row: 1 }]);
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].name, "Condition B");
        assert_eq!(report.curated.rows_skipped_checkpoint, 1);
    }
}
