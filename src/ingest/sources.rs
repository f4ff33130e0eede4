//! Per-ontology row readers behind the [`OntologySource`] trait: HPO
//! phenotype records, ICD-10 chapter/category rows, and hand-curated
//! entries.

use serde::{Deserialize, Serialize};

use crate::core::config::IngestConfig;
use crate::core::errors::Result;
use crate::core::text::contains_word_boundary;
use crate::core::types::{AgeRange, ConditionSource, PrevalenceBucket, SexPredilection, TemporalPattern, Urgency};
use crate::ingest::{OntologySource, RawConditionRow};

/// Keyword set used to decide whether an HPO term counts as an "observable
/// phenotype" and whether an ICD-10 description reads as symptom-like,
/// rather than a pure classification label. A configuration asset, not a
/// hard-coded list, so new domains can extend it without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordLexicon {
    pub keywords: Vec<String>,
}

impl Default for KeywordLexicon {
    fn default() -> Self {
        let words = [
            "pain", "fever", "fatigue", "cough", "rash", "headache", "nausea", "weakness", "swelling",
            "bleeding", "vomiting", "dizziness", "weight", "breath", "vision", "numbness", "tingling",
            "seizure", "confusion", "palpitations", "diarrhea", "constipation", "itching", "discharge",
        ];
        Self {
            keywords: words.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl KeywordLexicon {
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| contains_word_boundary(text, k))
    }
}

/// One HPO disease-to-phenotype record before filtering/merge.
#[derive(Debug, Clone, Deserialize)]
pub struct HpoDiseaseRecord {
    pub disease_name: String,
    pub hpo_terms: Vec<String>,
}

/// Reads HPO disease records, keeping only the phenotype terms that match
/// the keyword lexicon and dropping diseases with fewer than
/// `min_phenotypes` such terms (§4.3).
pub struct HpoSource {
    records: Vec<HpoDiseaseRecord>,
    min_phenotypes: usize,
    lexicon: KeywordLexicon,
}

impl HpoSource {
    pub fn new(records: Vec<HpoDiseaseRecord>, config: IngestConfig, lexicon: KeywordLexicon) -> Self {
        Self {
            records,
            min_phenotypes: config.min_phenotypes,
            lexicon,
        }
    }
}

impl OntologySource for HpoSource {
    fn source(&self) -> ConditionSource {
        ConditionSource::Hpo
    }

    fn read(&self) -> Result<Vec<RawConditionRow>> {
        let mut rows = Vec::new();
        for record in &self.records {
            let observable: Vec<String> = record
                .hpo_terms
                .iter()
                .filter(|term| self.lexicon.matches(term))
                .cloned()
                .collect();
            if observable.len() < self.min_phenotypes {
                continue;
            }
            rows.push(RawConditionRow {
                source: ConditionSource::Hpo,
                raw_name: record.disease_name.clone(),
                icd_codes: vec![],
                typical_symptoms: observable,
                rare_symptoms: vec![],
                red_flag_symptoms: vec![],
                recommended_tests: vec![],
                recommended_specialist: None,
                urgency_level: None,
                prevalence_bucket: Some(PrevalenceBucket::Rare),
                typical_age_range: None,
                sex_predilection: None,
                temporal_pattern: None,
            });
        }
        Ok(rows)
    }
}

/// One ICD-10 code/description row before filtering/merge.
#[derive(Debug, Clone, Deserialize)]
pub struct Icd10Record {
    pub code: String,
    pub description: String,
}

/// Reads ICD-10 rows, keeping chapters A–N (diseases and disorders) and
/// dropping O–Z (pregnancy/injury/external-cause/factors-influencing
/// chapters, out of scope for symptom-driven differential diagnosis).
/// Prevalence is inferred from a static three-character category table,
/// falling back to [`PrevalenceBucket::Uncommon`] for unlisted categories.
pub struct Icd10Source {
    records: Vec<Icd10Record>,
    lexicon: KeywordLexicon,
}

impl Icd10Source {
    pub fn new(records: Vec<Icd10Record>, lexicon: KeywordLexicon) -> Self {
        Self { records, lexicon }
    }
}

/// Static prevalence-by-category table, keyed by the ICD-10 code's leading
/// three characters. Deliberately small: anything unlisted defaults to
/// `Uncommon` rather than guessing.
fn prevalence_for_category(code: &str) -> PrevalenceBucket {
    let category = &code[..code.len().min(3)];
    match category {
        "E03" | "J45" | "I10" | "E11" => PrevalenceBucket::VeryCommon,
        "I21" | "K29" | "N39" => PrevalenceBucket::Common,
        "G35" | "M32" => PrevalenceBucket::Rare,
        _ => PrevalenceBucket::Uncommon,
    }
}

fn chapter_letter(code: &str) -> Option<char> {
    code.chars().next().filter(|c| c.is_ascii_alphabetic()).map(|c| c.to_ascii_uppercase())
}

impl OntologySource for Icd10Source {
    fn source(&self) -> ConditionSource {
        ConditionSource::Icd10
    }

    fn read(&self) -> Result<Vec<RawConditionRow>> {
        let mut rows = Vec::new();
        for record in &self.records {
            let Some(chapter) = chapter_letter(&record.code) else {
                continue;
            };
            if !('A'..='N').contains(&chapter) {
                continue;
            }
            if !self.lexicon.matches(&record.description) {
                continue;
            }
            rows.push(RawConditionRow {
                source: ConditionSource::Icd10,
                raw_name: record.description.clone(),
                icd_codes: vec![record.code.clone()],
                typical_symptoms: vec![record.description.clone()],
                rare_symptoms: vec![],
                red_flag_symptoms: vec![],
                recommended_tests: vec![],
                recommended_specialist: None,
                urgency_level: None,
                prevalence_bucket: Some(prevalence_for_category(&record.code)),
                typical_age_range: None,
                sex_predilection: None,
                temporal_pattern: None,
            });
        }
        Ok(rows)
    }
}

/// A fully hand-reviewed condition row: every field is already populated,
/// nothing is inferred. Curated rows win every scalar-field conflict during
/// merge (§4.3).
#[derive(Debug, Clone, Deserialize)]
pub struct CuratedConditionRow {
    pub name: String,
    pub icd_codes: Vec<String>,
    pub typical_symptoms: Vec<String>,
    pub rare_symptoms: Vec<String>,
    pub red_flag_symptoms: Vec<String>,
    pub recommended_tests: Vec<String>,
    pub recommended_specialist: String,
    pub urgency_level: Urgency,
    pub prevalence_bucket: PrevalenceBucket,
    pub typical_age_range: Option<AgeRange>,
    pub sex_predilection: SexPredilection,
    pub temporal_pattern: Option<TemporalPattern>,
}

pub struct CuratedSource {
    records: Vec<CuratedConditionRow>,
}

impl CuratedSource {
    pub fn new(records: Vec<CuratedConditionRow>) -> Self {
        Self { records }
    }
}

impl OntologySource for CuratedSource {
    fn source(&self) -> ConditionSource {
        ConditionSource::Curated
    }

    fn read(&self) -> Result<Vec<RawConditionRow>> {
        Ok(self
            .records
            .iter()
            .map(|r| RawConditionRow {
                source: ConditionSource::Curated,
                raw_name: r.name.clone(),
                icd_codes: r.icd_codes.clone(),
                typical_symptoms: r.typical_symptoms.clone(),
                rare_symptoms: r.rare_symptoms.clone(),
                red_flag_symptoms: r.red_flag_symptoms.clone(),
                recommended_tests: r.recommended_tests.clone(),
                recommended_specialist: Some(r.recommended_specialist.clone()),
                urgency_level: Some(r.urgency_level),
                prevalence_bucket: Some(r.prevalence_bucket),
                typical_age_range: r.typical_age_range,
                sex_predilection: Some(r.sex_predilection),
                temporal_pattern: r.temporal_pattern,
            })
            .collect())
    }
}
