//! Vector Index (C2): persistent store of (condition_id, vector, payload)
//! triples with cosine nearest-neighbour search and payload filtering.
//!
//! [`VectorStoreClient`] is the typed interface the rest of the pipeline
//! depends on; backends are thin adapters behind it (§9's redesign flag
//! replacing string-based filter dictionaries with a compiled, typed
//! expression). [`memory::InMemoryVectorStore`] is always available and is
//! what the test suite exercises; the `qdrant` feature adds
//! [`qdrant_backend::QdrantVectorStore`] for production deployments.

pub mod memory;
#[cfg(feature = "qdrant")]
pub mod qdrant_backend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::core::types::{Condition, SexPredilection};

pub use memory::InMemoryVectorStore;

/// Distance metric used by the collection. Cosine is the only one this
/// engine relies on; the type exists so `ensure_collection` can detect a
/// schema mismatch against a differently-configured existing collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    Cosine,
}

/// A typed, compiled filter expression (§9: "a small typed filter
/// expression (enum field + value(s))" replacing string-based filter
/// dictionaries). Each backend adapter compiles this to its own native
/// filter form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Filter {
    IsRareDisease(bool),
    SexPredilection(SexPredilection),
    /// Age must fall within the condition's typical range, with the given
    /// tolerance in years (§4.6's demographic pre-filter).
    AgeInRange { age: u8, tolerance_years: u32 },
    And(Vec<Filter>),
}

impl Filter {
    /// Evaluate the filter against a condition. Shared by every backend
    /// adapter so filter semantics never drift between implementations.
    pub fn matches(&self, condition: &Condition) -> bool {
        match self {
            Filter::IsRareDisease(expected) => condition.is_rare_disease() == *expected,
            Filter::SexPredilection(expected) => condition.sex_predilection == *expected,
            Filter::AgeInRange { age, tolerance_years } => match condition.typical_age_range {
                None => true,
                Some(range) => range.distance(*age) <= *tolerance_years,
            },
            Filter::And(filters) => filters.iter().all(|f| f.matches(condition)),
        }
    }
}

/// A single point to upsert: a condition, its vector, and nothing else —
/// the condition itself is both the payload and the unique key
/// (`condition_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPoint {
    pub condition: Condition,
    pub vector: Vec<f32>,
}

/// One search hit: the matched condition and its cosine similarity mapped
/// into `[0, 1]` via `(s+1)/2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub condition: Condition,
    pub score: f64,
}

/// Contract for the vector store client (§6). Implementations must be
/// `Send + Sync` so a single instance can be shared across concurrent
/// requests.
#[async_trait]
pub trait VectorStoreClient: Send + Sync {
    /// Create or validate the collection. Fails with
    /// [`crate::core::errors::DiagnosisError::SchemaMismatch`] if an
    /// existing collection has a different dimension or distance.
    async fn ensure_collection(&self, dim: usize, distance: Distance) -> Result<()>;

    /// Idempotent upsert; a point with an existing `condition_id` replaces
    /// the prior entry.
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()>;

    /// Cosine nearest-neighbour search, ordered by descending score, with an
    /// optional conjunctive filter.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchHit>>;

    /// Number of points currently stored.
    async fn count(&self) -> Result<usize>;
}

/// Cosine similarity between two equal-length vectors, mapped into `[0, 1]`
/// as `(cosine + 1) / 2` per §4.2. Returns `0.5` (the midpoint, i.e.
/// cosine 0) for a zero vector rather than dividing by zero.
pub fn cosine_similarity_unit(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.5;
    }
    let cosine = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f64;
    (cosine + 1.0) / 2.0
}
