//! Core value types for the diagnostic domain: patients, symptoms,
//! conditions, and the scored/assembled results derived from them.
//!
//! Enums are closed sets validated at deserialisation time rather than
//! left as free strings, and the non-empty/length-bounded symptom list is
//! its own type so the invariant is enforced once at construction instead
//! of being re-checked by every caller.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DiagnosisError, Result};

/// Subjective severity of a reported symptom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

/// How often a symptom recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Episodic,
    Intermittent,
    Constant,
    Progressive,
}

/// Patient sex as recorded on the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

/// A condition's predilection for one sex, used for demographic filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SexPredilection {
    Any,
    Male,
    Female,
}

impl SexPredilection {
    /// Whether `sex` contradicts this predilection (used for pre-filtering
    /// and for the demographic-fit penalty).
    pub fn contradicts(&self, sex: Sex) -> bool {
        match (self, sex) {
            (SexPredilection::Male, Sex::Female) => true,
            (SexPredilection::Female, Sex::Male) => true,
            _ => false,
        }
    }
}

/// Clinical urgency bucket of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    Urgent,
    Critical,
}

/// Coarse ordinal estimate of how frequently a condition is encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrevalenceBucket {
    VeryRare,
    Rare,
    Uncommon,
    Common,
    VeryCommon,
}

impl PrevalenceBucket {
    /// Whether this bucket counts as a rare disease for filtering purposes.
    pub fn is_rare(&self) -> bool {
        matches!(self, PrevalenceBucket::VeryRare | PrevalenceBucket::Rare)
    }
}

/// Ontology a condition record was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSource {
    Hpo,
    Icd10,
    Curated,
}

/// Coarse acute/chronic hint used by the temporal-fit scorer. Populated for
/// curated entries; absent for most HPO/ICD-10-derived rows (see DESIGN.md
/// for the resolution of the "temporal pattern inference" open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPattern {
    Acute,
    Chronic,
}

/// Operational triage tier attached to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewTier {
    Tier1Automated,
    Tier2PrimaryCare,
    Tier3Specialist,
    Tier4Multidisciplinary,
}

/// Inclusive age range in years, e.g. `(0, 18)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Whether `age` falls inside the range.
    pub fn contains(&self, age: u8) -> bool {
        age >= self.min && age <= self.max
    }

    /// Distance in years outside the range; zero if inside.
    pub fn distance(&self, age: u8) -> u32 {
        if age < self.min {
            (self.min - age) as u32
        } else if age > self.max {
            (age - self.max) as u32
        } else {
            0
        }
    }
}

/// A canonical medical condition record, as stored alongside its vector in
/// the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub condition_id: String,
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
    pub source: ConditionSource,
    pub temporal_pattern: Option<TemporalPattern>,
}

impl Condition {
    /// Derived flag, kept consistent with `prevalence_bucket` by
    /// construction rather than stored and risking drift.
    pub fn is_rare_disease(&self) -> bool {
        self.prevalence_bucket.is_rare()
    }

    /// Validate the invariants every condition must satisfy before it is
    /// upserted into the index.
    pub fn validate(&self) -> Result<()> {
        if self.condition_id.trim().is_empty() {
            return Err(DiagnosisError::invalid_field(
                "condition_id must not be empty",
                "condition_id",
            ));
        }
        if self.typical_symptoms.is_empty() {
            return Err(DiagnosisError::invalid_field(
                "every condition must have at least one typical symptom",
                "typical_symptoms",
            ));
        }
        Ok(())
    }
}

/// A single reported symptom within a patient case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symptom {
    pub description: String,
    pub severity: Severity,
    pub duration_days: u32,
    pub frequency: Frequency,
}

/// Non-empty, length-bounded list of symptoms. Constructed via
/// [`TryFrom<Vec<Symptom>>`] so the bound is enforced once rather than
/// re-checked at every call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Symptom>", into = "Vec<Symptom>")]
pub struct SymptomList(Vec<Symptom>);

/// Maximum number of symptoms accepted on a single case.
pub const MAX_SYMPTOMS: usize = 50;

impl SymptomList {
    pub fn as_slice(&self) -> &[Symptom] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Symptom> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<Symptom>> for SymptomList {
    type Error = DiagnosisError;

    fn try_from(value: Vec<Symptom>) -> Result<Self> {
        if value.is_empty() {
            return Err(DiagnosisError::invalid_field(
                "symptoms must not be empty",
                "symptoms",
            ));
        }
        if value.len() > MAX_SYMPTOMS {
            return Err(DiagnosisError::invalid_field(
                format!("symptoms exceeds maximum of {MAX_SYMPTOMS}"),
                "symptoms",
            ));
        }
        Ok(SymptomList(value))
    }
}

impl From<SymptomList> for Vec<Symptom> {
    fn from(value: SymptomList) -> Self {
        value.0
    }
}

impl<'a> IntoIterator for &'a SymptomList {
    type Item = &'a Symptom;
    type IntoIter = std::slice::Iter<'a, Symptom>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A structured patient case submitted for analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientCase {
    pub case_id: String,
    pub age: u8,
    pub sex: Sex,
    pub chief_complaint: String,
    pub symptoms: SymptomList,
}

impl PatientCase {
    /// Validate the case invariants beyond what [`SymptomList`] already
    /// enforces (age bound; `case_id` is opaque and not otherwise
    /// interpreted, per the spec).
    pub fn validate(&self) -> Result<()> {
        if self.age > 120 {
            return Err(DiagnosisError::invalid_field(
                "age must be in [0, 120]",
                "age",
            ));
        }
        Ok(())
    }

    /// All free text on the case relevant to symptom/red-flag matching:
    /// the chief complaint followed by each symptom description.
    pub fn all_text(&self) -> Vec<&str> {
        let mut texts = vec![self.chief_complaint.as_str()];
        texts.extend(self.symptoms.iter().map(|s| s.description.as_str()));
        texts
    }
}

/// A condition scored against a specific case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub condition: Condition,
    pub vector_similarity: f64,
    pub symptom_overlap: f64,
    pub temporal_fit: f64,
    pub demographic_fit: f64,
    pub confidence: f64,
    pub matched_symptoms: BTreeSet<String>,
    pub red_flags_hit: BTreeSet<String>,
}

/// The final, caller-facing result of analysing one patient case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub case_id: String,
    /// The highest-confidence candidate, if any was assembled — the same
    /// entry as `differential_diagnoses.first()`, carried as its own field
    /// so callers consuming the wire format don't need to derive it.
    pub primary_diagnosis: Option<ScoredCandidate>,
    pub differential_diagnoses: Vec<ScoredCandidate>,
    pub review_tier: ReviewTier,
    pub overall_confidence: f64,
    pub red_flags_detected: BTreeSet<String>,
    pub requires_emergency_care: bool,
    pub recommended_specialists: Vec<String>,
    pub recommended_tests: Vec<String>,
    pub reasoning_summary: String,
    pub processing_time_ms: u64,
}

impl DiagnosticResult {
    /// The highest-confidence candidate, if any was assembled.
    pub fn primary_diagnosis(&self) -> Option<&ScoredCandidate> {
        self.primary_diagnosis.as_ref()
    }
}
