//! Qdrant-backed [`VectorStoreClient`] adapter, compiled in behind the
//! `qdrant` feature. Translates the typed [`Filter`] expression into
//! Qdrant's native filter JSON and retries transient I/O per the
//! documented backoff policy (§7) before surfacing
//! [`DiagnosisError::IndexUnavailable`].

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition as QdrantCondition, CreateCollectionBuilder, Distance as QdrantDistance, Filter as QdrantFilter,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::warn;

use crate::core::config::RetryConfig;
use crate::core::errors::{DiagnosisError, Result};
use crate::core::types::Condition;
use crate::index::{Distance, Filter, IndexPoint, SearchHit, VectorStoreClient};

/// Adapter wrapping a `qdrant_client::Qdrant` connection.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
    retry: RetryConfig,
}

impl QdrantVectorStore {
    pub fn new(client: Qdrant, collection_name: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            client,
            collection_name: collection_name.into(),
            retry,
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, qdrant_client::QdrantError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 < self.retry.max_attempts => {
                    warn!(operation, attempt, %err, "transient vector index error, retrying");
                    tokio::time::sleep(self.retry.backoff_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(DiagnosisError::index_unavailable(format!(
                        "{operation} failed after {attempt_count} attempts: {err}",
                        attempt_count = attempt + 1
                    )))
                }
            }
        }
    }
}

fn compile_filter(filter: &Filter) -> QdrantFilter {
    match filter {
        Filter::IsRareDisease(expected) => {
            QdrantFilter::must([QdrantCondition::matches("is_rare_disease", *expected)])
        }
        Filter::SexPredilection(expected) => {
            QdrantFilter::must([QdrantCondition::matches(
                "sex_predilection",
                format!("{expected:?}").to_lowercase(),
            )])
        }
        Filter::AgeInRange { .. } => QdrantFilter::must([]),
        Filter::And(filters) => {
            let mut combined = QdrantFilter::default();
            for f in filters {
                combined.must.extend(compile_filter(f).must);
            }
            combined
        }
    }
}

fn condition_to_payload(condition: &Condition) -> Result<Payload> {
    let value = serde_json::to_value(condition)
        .map_err(|e| DiagnosisError::internal(format!("failed to serialise condition payload: {e}")))?;
    Payload::try_from(value)
        .map_err(|e| DiagnosisError::internal(format!("failed to build qdrant payload: {e}")))
}

fn payload_to_condition(payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>) -> Result<Condition> {
    let json = serde_json::to_value(Payload::from(payload))
        .map_err(|e| DiagnosisError::internal(format!("failed to read qdrant payload: {e}")))?;
    serde_json::from_value(json)
        .map_err(|e| DiagnosisError::internal(format!("failed to deserialise condition payload: {e}")))
}

#[async_trait]
impl VectorStoreClient for QdrantVectorStore {
    async fn ensure_collection(&self, dim: usize, distance: Distance) -> Result<()> {
        let qdrant_distance = match distance {
            Distance::Cosine => QdrantDistance::Cosine,
        };

        let exists = self
            .with_retry("collection_exists", || self.client.collection_exists(&self.collection_name))
            .await?;

        if exists {
            let info = self
                .with_retry("collection_info", || self.client.collection_info(&self.collection_name))
                .await?;
            let params = info
                .result
                .and_then(|r| r.config)
                .and_then(|c| c.params)
                .and_then(|p| p.vectors_config)
                .and_then(|v| v.config);
            if let Some(qdrant_client::qdrant::vectors_config::Config::Params(params)) = params {
                if params.size as usize != dim || params.distance != qdrant_distance as i32 {
                    return Err(DiagnosisError::schema_mismatch(
                        "existing qdrant collection has a different dimension or distance",
                    ));
                }
            }
            return Ok(());
        }

        self.with_retry("create_collection", || {
            self.client.create_collection(
                CreateCollectionBuilder::new(&self.collection_name)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, qdrant_distance)),
            )
        })
        .await?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        let mut qdrant_points = Vec::with_capacity(points.len());
        for point in points {
            point.condition.validate()?;
            let payload = condition_to_payload(&point.condition)?;
            qdrant_points.push(PointStruct::new(
                point.condition.condition_id.clone(),
                point.vector,
                payload,
            ));
        }

        self.with_retry("upsert", || {
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection_name, qdrant_points.clone()))
        })
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchHit>> {
        let mut builder = SearchPointsBuilder::new(&self.collection_name, query_vector.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(f) = filter {
            builder = builder.filter(compile_filter(f));
        }

        let response = self.with_retry("search", || self.client.search_points(builder.clone())).await?;

        let mut hits = Vec::with_capacity(response.result.len());
        for scored_point in response.result {
            let condition = payload_to_condition(scored_point.payload)?;
            let cosine = scored_point.score as f64;
            hits.push(SearchHit {
                condition,
                score: (cosine + 1.0) / 2.0,
            });
        }
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .with_retry("count", || self.client.count(qdrant_client::qdrant::CountPointsBuilder::new(&self.collection_name)))
            .await?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
