//! Configuration types for the diagnostic engine.
//!
//! [`EngineConfig`] is the single structure threaded through service
//! construction; it is immutable after process start (per §5's
//! shared-resource policy) and validated once at construction so that a bad
//! configuration fails fast instead of surfacing as a confusing runtime
//! error deep in the pipeline.

pub mod scoring;
pub mod validation;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use scoring::{RetrievalLimits, RrfConfig, ScoringWeights, TemporalFitConfig, TriageThresholds};

use crate::core::errors::Result;

/// Retry policy for transient vector-index I/O errors (§7): bounded
/// exponential backoff starting at `initial_backoff`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "duration_millis")]
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 4.0,
        }
    }
}

impl RetryConfig {
    /// Backoff duration before attempt number `attempt` (0-indexed).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let millis = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(millis as u64)
    }
}

/// Per-suspension-point timeouts (§5) and the overall request deadline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(with = "duration_millis")]
    pub encoder: Duration,
    #[serde(with = "duration_millis")]
    pub index_search: Duration,
    #[serde(with = "duration_millis")]
    pub cache_op: Duration,
    #[serde(with = "duration_millis")]
    pub overall: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            encoder: Duration::from_millis(1_500),
            index_search: Duration::from_millis(1_000),
            cache_op: Duration::from_millis(100),
            overall: Duration::from_millis(5_000),
        }
    }
}

/// Embedding model and degraded-mode configuration for the text encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub model_id: String,
    pub dimension: usize,
    /// When true, the encoder returns a fixed zero vector instead of
    /// running inference. Only ever set explicitly; never entered silently
    /// (§4.1).
    pub degraded_mode: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            model_id: "BGESmallENV15".to_string(),
            dimension: 768,
            degraded_mode: false,
        }
    }
}

/// Embedding cache sizing and TTL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50_000,
            ttl_days: 30,
        }
    }
}

/// Vector index collection identity and client concurrency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub collection_name: String,
    pub concurrency_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection_name: "medical_conditions".to_string(),
            concurrency_limit: 8,
        }
    }
}

/// Minimum phenotype-term count for an HPO disease row to be kept (§4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IngestConfig {
    pub min_phenotypes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { min_phenotypes: 3 }
    }
}

/// Top-level configuration aggregating every section above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub encoder: EncoderConfig,
    pub cache: CacheConfig,
    pub index: IndexConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalLimits,
    pub rrf: RrfConfig,
    pub weights: ScoringWeights,
    pub temporal: TemporalFitConfig,
    pub triage: TriageThresholds,
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            cache: CacheConfig::default(),
            index: IndexConfig::default(),
            ingest: IngestConfig::default(),
            retrieval: RetrievalLimits::default(),
            rrf: RrfConfig::default(),
            weights: ScoringWeights::default(),
            temporal: TemporalFitConfig::default(),
            triage: TriageThresholds::default(),
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate every section; called once at service construction.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.triage.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn retry_backoff_follows_documented_schedule() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_for(0), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(1), Duration::from_millis(400));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(1_600));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.index.collection_name, config.index.collection_name);
    }
}
