//! Red-Flag Detector (C5): flags language associated with life-threatening
//! presentations before any retrieval happens. Never returns a diagnosis —
//! only a flag.

use std::collections::BTreeSet;

use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};

use crate::core::errors::{DiagnosisError, Result};
use crate::core::types::PatientCase;

/// Urgency tag attached to a matched red-flag phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlagSeverity {
    Warning,
    Emergency,
}

/// One entry in the red-flag lexicon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedFlagEntry {
    pub phrase: String,
    pub severity: RedFlagSeverity,
}

/// Editable, configuration-loaded set of red-flag phrases. The default
/// seeds the phrases named in §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedFlagLexicon {
    pub entries: Vec<RedFlagEntry>,
}

impl Default for RedFlagLexicon {
    fn default() -> Self {
        use RedFlagSeverity::*;
        let seed = [
            ("crushing chest pain", Emergency),
            ("sudden severe headache", Emergency),
            ("loss of consciousness", Emergency),
            ("stroke symptoms", Emergency),
            ("difficulty breathing at rest", Emergency),
            ("uncontrolled bleeding", Emergency),
            ("slurred speech", Emergency),
            ("facial drooping", Emergency),
            ("coughing up blood", Warning),
            ("severe abdominal pain", Warning),
            ("suicidal thoughts", Emergency),
        ];
        Self {
            entries: seed
                .into_iter()
                .map(|(phrase, severity)| RedFlagEntry {
                    phrase: phrase.to_string(),
                    severity,
                })
                .collect(),
        }
    }
}

/// Result of running the detector against a case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedFlagReport {
    pub matched: BTreeSet<String>,
    pub max_severity: Option<RedFlagSeverity>,
}

impl RedFlagReport {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Compiled red-flag matcher built once from a [`RedFlagLexicon`].
pub struct RedFlagDetector {
    automaton: AhoCorasick,
    entries: Vec<RedFlagEntry>,
}

impl RedFlagDetector {
    pub fn new(lexicon: &RedFlagLexicon) -> Result<Self> {
        let patterns: Vec<String> = lexicon
            .entries
            .iter()
            .map(|e| e.phrase.to_lowercase())
            .collect();
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(true)
            .build(&patterns)
            .map_err(|e| DiagnosisError::internal(format!("failed to build red-flag automaton: {e}")))?;

        Ok(Self {
            automaton,
            entries: lexicon.entries.clone(),
        })
    }

    /// Scan the concatenation of the chief complaint and every symptom
    /// description (§4.5) and return matched phrases plus the maximum
    /// severity seen.
    pub fn detect(&self, case: &PatientCase) -> RedFlagReport {
        let mut matched = BTreeSet::new();
        let mut max_severity: Option<RedFlagSeverity> = None;

        for text in case.all_text() {
            let lowered = text.to_lowercase();
            for m in self.automaton.find_iter(&lowered) {
                let entry = &self.entries[m.pattern().as_usize()];
                let before_ok = m.start() == 0 || !is_word_byte(lowered.as_bytes()[m.start() - 1]);
                let after_ok = m.end() >= lowered.len() || !is_word_byte(lowered.as_bytes()[m.end()]);
                if before_ok && after_ok {
                    matched.insert(entry.phrase.clone());
                    max_severity = Some(match max_severity {
                        Some(current) if current >= entry.severity => current,
                        _ => entry.severity,
                    });
                }
            }
        }

        RedFlagReport { matched, max_severity }
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Sex, Severity, Frequency, Symptom, SymptomList};

    fn case(chief_complaint: &str, descriptions: &[&str]) -> PatientCase {
        let symptoms: SymptomList = descriptions
            .iter()
            .map(|d| Symptom {
                description: d.to_string(),
                severity: Severity::Severe,
                duration_days: 0,
                frequency: Frequency::Constant,
            })
            .collect::<Vec<_>>()
            .try_into()
            .unwrap();
        PatientCase {
            case_id: "case".into(),
            age: 40,
            sex: Sex::Male,
            chief_complaint: chief_complaint.to_string(),
            symptoms,
        }
    }

    #[test]
    fn detects_emergency_phrase_in_chief_complaint() {
        let detector = RedFlagDetector::new(&RedFlagLexicon::default()).unwrap();
        let report = detector.detect(&case("crushing chest pain radiating to left arm", &["sweating"]));
        assert!(report.matched.contains("crushing chest pain"));
        assert_eq!(report.max_severity, Some(RedFlagSeverity::Emergency));
    }

    #[test]
    fn detects_phrase_in_symptom_description() {
        let detector = RedFlagDetector::new(&RedFlagLexicon::default()).unwrap();
        let report = detector.detect(&case("feeling unwell", &["loss of consciousness this morning"]));
        assert!(report.matched.contains("loss of consciousness"));
    }

    #[test]
    fn no_match_returns_empty_report() {
        let detector = RedFlagDetector::new(&RedFlagLexicon::default()).unwrap();
        let report = detector.detect(&case("mild headache", &["tiredness"]));
        assert!(report.is_empty());
        assert_eq!(report.max_severity, None);
    }

    #[test]
    fn is_case_insensitive() {
        let detector = RedFlagDetector::new(&RedFlagLexicon::default()).unwrap();
        let report = detector.detect(&case("CRUSHING CHEST PAIN", &[]));
        assert!(report.matched.contains("crushing chest pain"));
    }

    #[test]
    fn higher_severity_wins_when_multiple_phrases_match() {
        let detector = RedFlagDetector::new(&RedFlagLexicon::default()).unwrap();
        let report = detector.detect(&case(
            "severe abdominal pain",
            &["loss of consciousness"],
        ));
        assert_eq!(report.max_severity, Some(RedFlagSeverity::Emergency));
    }
}
