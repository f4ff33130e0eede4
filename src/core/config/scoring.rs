//! Scoring weight and temporal-fit configuration.

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

use super::validation::{validate_positive_usize, validate_unit_range};

/// Weights combining the four scoring signals into a final confidence.
/// Defaults match the documented weight split (§4.7); the open question of
/// whether that split is calibration-justified is resolved by making it
/// configuration with a validation hook rather than a hard-coded constant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub vector_similarity: f64,
    pub symptom_overlap: f64,
    pub temporal_fit: f64,
    pub demographic_fit: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            vector_similarity: 0.5,
            symptom_overlap: 0.3,
            temporal_fit: 0.1,
            demographic_fit: 0.1,
        }
    }
}

impl ScoringWeights {
    /// Weights with everything but vector similarity zeroed out, used by the
    /// weight-isolation property test (§8: ranking must then match C6's
    /// rank-1 order exactly).
    pub fn vector_only() -> Self {
        Self {
            vector_similarity: 1.0,
            symptom_overlap: 0.0,
            temporal_fit: 0.0,
            demographic_fit: 0.0,
        }
    }

    /// Validate that each weight is non-negative and the set sums to 1.0
    /// within a small epsilon.
    pub fn validate(&self) -> Result<()> {
        for (value, field) in [
            (self.vector_similarity, "vector_similarity"),
            (self.symptom_overlap, "symptom_overlap"),
            (self.temporal_fit, "temporal_fit"),
            (self.demographic_fit, "demographic_fit"),
        ] {
            if value < 0.0 {
                return Err(crate::core::errors::DiagnosisError::invalid_field(
                    format!("{field} weight must be non-negative"),
                    field,
                ));
            }
        }
        let sum = self.vector_similarity + self.symptom_overlap + self.temporal_fit + self.demographic_fit;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(crate::core::errors::DiagnosisError::invalid_field(
                format!("scoring weights must sum to 1.0, got {sum}"),
                "weights",
            ));
        }
        Ok(())
    }
}

/// Duration thresholds used by the temporal-fit scorer's acute/chronic
/// favoured ranges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemporalFitConfig {
    /// Acute conditions favour durations at or below this many days.
    pub acute_favoured_max_days: u32,
    /// Chronic conditions favour durations at or above this many days.
    pub chronic_favoured_min_days: u32,
    /// Neutral score returned when no hint or no matched symptom exists.
    pub neutral_score: f64,
    /// Score returned for a strong mismatch.
    pub mismatch_score: f64,
}

impl Default for TemporalFitConfig {
    fn default() -> Self {
        Self {
            acute_favoured_max_days: 14,
            chronic_favoured_min_days: 30,
            neutral_score: 0.5,
            mismatch_score: 0.1,
        }
    }
}

/// Tier thresholds for the triage classifier (§4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TriageThresholds {
    pub tier1_threshold: f64,
    pub tier2_threshold: f64,
    pub tier3_threshold: f64,
}

impl Default for TriageThresholds {
    fn default() -> Self {
        Self {
            tier1_threshold: 0.85,
            tier2_threshold: 0.60,
            tier3_threshold: 0.40,
        }
    }
}

impl TriageThresholds {
    pub fn validate(&self) -> Result<()> {
        validate_unit_range(self.tier1_threshold, "tier1_threshold")?;
        validate_unit_range(self.tier2_threshold, "tier2_threshold")?;
        validate_unit_range(self.tier3_threshold, "tier3_threshold")?;
        if !(self.tier1_threshold >= self.tier2_threshold
            && self.tier2_threshold >= self.tier3_threshold)
        {
            return Err(crate::core::errors::DiagnosisError::invalid_field(
                "triage thresholds must be non-increasing: tier1 >= tier2 >= tier3",
                "triage_thresholds",
            ));
        }
        Ok(())
    }
}

/// Reciprocal-rank-fusion parameters for combining the three sub-queries
/// (§4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RrfConfig {
    pub k: f64,
    pub weight_broad: f64,
    pub weight_focused: f64,
    pub weight_rare: f64,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            k: 60.0,
            weight_broad: 1.0,
            weight_focused: 0.8,
            weight_rare: 1.2,
        }
    }
}

/// Per-sub-query `top_k` values and output caps for the candidate retriever
/// and final ranker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalLimits {
    pub broad_top_k: usize,
    pub focused_top_k: usize,
    pub rare_top_k: usize,
    pub age_tolerance_years: u32,
    pub top_k_candidates: usize,
    pub final_results_limit: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            broad_top_k: 50,
            focused_top_k: 20,
            rare_top_k: 10,
            age_tolerance_years: 10,
            top_k_candidates: 50,
            final_results_limit: 10,
        }
    }
}

impl RetrievalLimits {
    pub fn validate(&self) -> Result<()> {
        validate_positive_usize(self.broad_top_k, "broad_top_k")?;
        validate_positive_usize(self.focused_top_k, "focused_top_k")?;
        validate_positive_usize(self.rare_top_k, "rare_top_k")?;
        validate_positive_usize(self.top_k_candidates, "top_k_candidates")?;
        validate_positive_usize(self.final_results_limit, "final_results_limit")?;
        Ok(())
    }
}
