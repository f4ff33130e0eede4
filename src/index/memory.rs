//! In-memory [`VectorStoreClient`] adapter: a brute-force cosine scan over a
//! lock-guarded vector. This is the store the test suite exercises directly
//! (no network access required) and the fallback used when no external
//! store is configured.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::core::errors::{DiagnosisError, Result};
use crate::index::{cosine_similarity_unit, Distance, Filter, IndexPoint, SearchHit, VectorStoreClient};

struct Collection {
    dimension: usize,
    distance: Distance,
    points: Vec<IndexPoint>,
}

/// Always-available in-process vector store.
pub struct InMemoryVectorStore {
    collection: RwLock<Option<Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collection: RwLock::new(None),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStoreClient for InMemoryVectorStore {
    async fn ensure_collection(&self, dim: usize, distance: Distance) -> Result<()> {
        let mut guard = self.collection.write();
        match guard.as_ref() {
            Some(existing) => {
                if existing.dimension != dim || existing.distance != distance {
                    return Err(DiagnosisError::schema_mismatch(format!(
                        "collection exists with dimension {} and distance {:?}, requested {} / {:?}",
                        existing.dimension, existing.distance, dim, distance
                    )));
                }
            }
            None => {
                *guard = Some(Collection {
                    dimension: dim,
                    distance,
                    points: Vec::new(),
                });
            }
        }
        Ok(())
    }

    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        let mut guard = self.collection.write();
        let collection = guard
            .as_mut()
            .ok_or_else(|| DiagnosisError::internal("ensure_collection must be called before upsert"))?;

        for point in points {
            point.condition.validate()?;
            if point.vector.len() != collection.dimension {
                return Err(DiagnosisError::schema_mismatch(format!(
                    "vector dimension {} does not match collection dimension {}",
                    point.vector.len(),
                    collection.dimension
                )));
            }
            if let Some(existing) = collection
                .points
                .iter_mut()
                .find(|p| p.condition.condition_id == point.condition.condition_id)
            {
                *existing = point;
            } else {
                collection.points.push(point);
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchHit>> {
        let guard = self.collection.read();
        let collection = guard
            .as_ref()
            .ok_or_else(|| DiagnosisError::internal("ensure_collection must be called before search"))?;

        let mut hits: Vec<SearchHit> = collection
            .points
            .iter()
            .filter(|p| filter.map(|f| f.matches(&p.condition)).unwrap_or(true))
            .map(|p| SearchHit {
                condition: p.condition.clone(),
                score: cosine_similarity_unit(query_vector, &p.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.condition.condition_id.cmp(&b.condition.condition_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let guard = self.collection.read();
        Ok(guard.as_ref().map(|c| c.points.len()).unwrap_or(0))
    }
}
