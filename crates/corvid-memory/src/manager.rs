use std::collections::HashMap;

use chrono::Utc;
use qdrant_client::qdrant::{
    vectors_config::Config as VectorsConfigInner, Condition, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance, FieldType, Filter,
    NamedVectors, PointId, PointStruct, SearchPointsBuilder, SparseIndexConfig,
    SparseVectorParams, SparseVectorsConfig, UpsertPointsBuilder, Value as QdrantValue, Vector,
    VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::types::{Collection, Fact, FilterExpr, SparseVector};

const DENSE_VECTOR_NAME: &str = "dense";
const SPARSE_VECTOR_NAME: &str = "sparse";
const HNSW_M: u64 = 16;
const HNSW_EF_CONSTRUCT: u64 = 200;
/// Reciprocal-rank-fusion constant recommended for merging dense/sparse
/// sub-results (see the design notes on hybrid search).
const RRF_K: f32 = 60.0;

/// Hybrid dense+sparse vector memory store (C1). One Qdrant collection per
/// `Collection` variant; every operation is synchronous from the caller's
/// point of view — it either completes fully or returns a typed error.
pub struct MemoryStore {
    client: Qdrant,
    embedding_dimension: u64,
}

impl MemoryStore {
    pub fn new(qdrant_url: &str, embedding_dimension: usize) -> Result<Self> {
        let client = Qdrant::from_url(qdrant_url)
            .build()
            .map_err(|e| MemoryError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            embedding_dimension: embedding_dimension as u64,
        })
    }

    /// Create (or, if `fresh`, drop-then-recreate) all three collections
    /// with an HNSW dense index, a sparse inverted index, and a text index
    /// on the name field (needed for the prefix-match filter).
    #[instrument(skip(self))]
    pub async fn ensure_collections(&self, fresh: bool) -> Result<()> {
        for collection in Collection::ALL {
            let name = collection.qdrant_name();

            if fresh {
                let _ = self.client.delete_collection(name).await;
                // Brief settling delay so Qdrant finishes tearing down
                // segment files before we ask it to recreate the name.
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }

            let exists = self
                .client
                .collection_exists(name)
                .await
                .map_err(|e| MemoryError::Backend(e.to_string()))?;

            if exists {
                info!(collection = name, "collection already present, loaded");
                continue;
            }

            let mut vectors_map = HashMap::new();
            vectors_map.insert(
                DENSE_VECTOR_NAME.to_string(),
                VectorParams {
                    size: self.embedding_dimension,
                    distance: Distance::Dot.into(),
                    hnsw_config: Some(qdrant_client::qdrant::HnswConfigDiff {
                        m: Some(HNSW_M),
                        ef_construct: Some(HNSW_EF_CONSTRUCT as u64),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            );

            let mut sparse_map = HashMap::new();
            sparse_map.insert(
                SPARSE_VECTOR_NAME.to_string(),
                SparseVectorParams {
                    index: Some(SparseIndexConfig {
                        full_scan_threshold: None,
                        on_disk: None,
                        datatype: None,
                    }),
                    modifier: None,
                },
            );

            self.client
                .create_collection(
                    CreateCollectionBuilder::new(name)
                        .vectors_config(VectorsConfig {
                            config: Some(VectorsConfigInner::ParamsMap(
                                qdrant_client::qdrant::VectorParamsMap { map: vectors_map },
                            )),
                        })
                        .sparse_vectors_config(SparseVectorsConfig { map: sparse_map }),
                )
                .await
                .map_err(|e| MemoryError::Backend(e.to_string()))?;

            // A full-text match condition (used by the name-field prefix
            // filter) only executes against a field that carries a text
            // index; Qdrant does not fall back to an unindexed scan for it.
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    name,
                    collection.name_field(),
                    FieldType::Text,
                ))
                .await
                .map_err(|e| MemoryError::Backend(e.to_string()))?;

            info!(collection = name, "created collection");
        }
        Ok(())
    }

    /// `store_fact` with an auto-generated time-unique id.
    #[instrument(skip(self, metadata, dense, sparse))]
    pub async fn store_fact(
        &self,
        collection: Collection,
        owner_id: &str,
        name: &str,
        text: &str,
        metadata: HashMap<String, serde_json::Value>,
        dense: Vec<f32>,
        sparse: SparseVector,
    ) -> Result<String> {
        self.store_fact_with_id(collection, None, owner_id, name, text, metadata, dense, sparse)
            .await
    }

    /// `store_fact`, but the caller may supply a deterministic id (used by
    /// persona seeding). Writes exactly one row.
    #[instrument(skip(self, metadata, dense, sparse))]
    #[allow(clippy::too_many_arguments)]
    pub async fn store_fact_with_id(
        &self,
        collection: Collection,
        id: Option<String>,
        owner_id: &str,
        name: &str,
        text: &str,
        metadata: HashMap<String, serde_json::Value>,
        dense: Vec<f32>,
        sparse: SparseVector,
    ) -> Result<String> {
        if text.is_empty() {
            return Err(MemoryError::InvalidFilter("fact text must not be empty".into()));
        }
        if dense.len() as u64 != self.embedding_dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.embedding_dimension as usize,
                actual: dense.len(),
            });
        }
        if !sparse.is_well_formed() {
            return Err(MemoryError::InvalidFilter(
                "sparse vector indices must be strictly increasing".into(),
            ));
        }

        let fact_id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
        let created_at = Utc::now();

        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert(collection.owner_field().to_string(), owner_id.into());
        payload.insert(collection.name_field().to_string(), name.into());
        payload.insert("text".to_string(), text.into());
        payload.insert("created_at".to_string(), created_at.to_rfc3339().into());
        for (k, v) in &metadata {
            payload.insert(k.clone(), json_to_qdrant_value(v));
        }

        let vectors = NamedVectors::default()
            .add_vector(DENSE_VECTOR_NAME, dense)
            .add_vector(
                SPARSE_VECTOR_NAME,
                Vector::new_sparse(sparse.indices.clone(), sparse.values.clone()),
            );

        let point = PointStruct::new(
            PointId::from(fact_id.clone()),
            vectors,
            Payload::new_from_hashmap(payload),
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection.qdrant_name(), vec![point]))
            .await
            .map_err(|e| MemoryError::Backend(e.to_string()))?;

        Ok(fact_id)
    }

    /// `true` iff a row with `id` exists in `collection`. Used by persona
    /// seeding (skip-if-present) and by the session manager's identity-fact
    /// existence check.
    pub async fn fact_exists(&self, collection: Collection, id: &str) -> Result<bool> {
        let result = self
            .client
            .get_points(qdrant_client::qdrant::GetPointsBuilder::new(
                collection.qdrant_name(),
                vec![PointId::from(id.to_string())],
            ))
            .await
            .map_err(|e| MemoryError::Backend(e.to_string()))?;
        Ok(!result.result.is_empty())
    }

    /// Hybrid ANN search: one dense sub-request, one sparse sub-request
    /// (same filter on both), merged by reciprocal-rank fusion. Degrades to
    /// dense-only when `sparse` is empty.
    #[instrument(skip(self, dense, sparse))]
    pub async fn search_facts(
        &self,
        collection: Collection,
        dense: &[f32],
        sparse: &SparseVector,
        k: usize,
        filter: &FilterExpr,
    ) -> Result<Vec<(Fact, f32)>> {
        let qdrant_filter = build_qdrant_filter(filter)?;
        let name = collection.qdrant_name();

        let dense_results = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, dense.to_vec(), k as u64)
                    .vector_name(DENSE_VECTOR_NAME)
                    .filter(qdrant_filter.clone())
                    .with_payload(true),
            )
            .await
            .map_err(|e| MemoryError::Backend(e.to_string()))?
            .result;

        let sparse_results = if sparse.is_empty() {
            Vec::new()
        } else {
            self.client
                .search_points(
                    SearchPointsBuilder::new(name, Vec::<f32>::new(), k as u64)
                        .vector_name(SPARSE_VECTOR_NAME)
                        .sparse_indices(sparse.indices.clone())
                        .sparse_values(sparse.values.clone())
                        .filter(qdrant_filter)
                        .with_payload(true),
                )
                .await
                .map_err(|e| MemoryError::Backend(e.to_string()))?
                .result
        };

        Ok(rrf_merge(collection, dense_results, sparse_results, k))
    }

    /// Search all three collections with k' = ceil(k/3) and merge by
    /// descending score (stable on ties), truncated to `k`.
    #[instrument(skip(self, dense, sparse))]
    pub async fn search_all(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        k: usize,
    ) -> Result<Vec<(Fact, f32)>> {
        let per_collection_k = k.div_ceil(3).max(1);
        let mut merged = Vec::new();
        for collection in Collection::ALL {
            let mut rows = self
                .search_facts(collection, dense, sparse, per_collection_k, &FilterExpr::new())
                .await?;
            merged.append(&mut rows);
        }
        merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(k);
        Ok(merged)
    }

    /// Filter-only existence lookup, no vector similarity involved. Used by
    /// the session manager's identity-fact existence check, which only
    /// needs "does a row matching this filter exist" rather than a ranked
    /// result set.
    #[instrument(skip(self))]
    pub async fn scroll_by_filter(&self, collection: Collection, filter: &FilterExpr, limit: usize) -> Result<Vec<Fact>> {
        let qdrant_filter = build_qdrant_filter(filter)?;
        let response = self
            .client
            .scroll(
                qdrant_client::qdrant::ScrollPointsBuilder::new(collection.qdrant_name())
                    .filter(qdrant_filter)
                    .limit(limit as u32)
                    .with_payload(true),
            )
            .await
            .map_err(|e| MemoryError::Backend(e.to_string()))?;

        Ok(response
            .result
            .iter()
            .filter_map(|point| retrieved_to_fact(collection, point))
            .collect())
    }
}

fn build_qdrant_filter(filter: &FilterExpr) -> Result<Filter> {
    let mut must = Vec::new();
    for (field, value) in &filter.equals {
        must.push(Condition::matches(field.clone(), value.clone()));
    }
    for (field, value) in &filter.prefix {
        // Qdrant has no native prefix-match condition; a full-text match on
        // an indexed keyword field is the closest approximation available
        // without a custom payload index per field.
        must.push(Condition::matches_text(field.clone(), value.clone()));
    }
    Ok(Filter {
        must,
        ..Default::default()
    })
}

fn json_to_qdrant_value(v: &serde_json::Value) -> QdrantValue {
    match v {
        serde_json::Value::String(s) => s.clone().into(),
        serde_json::Value::Bool(b) => (*b).into(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else {
                n.as_f64().unwrap_or(0.0).into()
            }
        }
        _ => v.to_string().into(),
    }
}

fn rrf_merge(
    collection: Collection,
    dense: Vec<qdrant_client::qdrant::ScoredPoint>,
    sparse: Vec<qdrant_client::qdrant::ScoredPoint>,
    k: usize,
) -> Vec<(Fact, f32)> {
    let mut fused: HashMap<String, (Fact, f32)> = HashMap::new();

    for (rank, point) in dense.into_iter().enumerate() {
        if let Some(fact) = point_to_fact(collection, &point) {
            let id = fact.id.clone();
            let rrf = 1.0 / (RRF_K + rank as f32 + 1.0);
            fused
                .entry(id)
                .and_modify(|(_, score)| *score += rrf)
                .or_insert((fact, rrf));
        }
    }
    for (rank, point) in sparse.into_iter().enumerate() {
        if let Some(fact) = point_to_fact(collection, &point) {
            let id = fact.id.clone();
            let rrf = 1.0 / (RRF_K + rank as f32 + 1.0);
            fused
                .entry(id)
                .and_modify(|(_, score)| *score += rrf)
                .or_insert((fact, rrf));
        }
    }

    let mut out: Vec<(Fact, f32)> = fused.into_values().collect();
    out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(k);
    out
}

fn point_to_fact(collection: Collection, point: &qdrant_client::qdrant::ScoredPoint) -> Option<Fact> {
    fact_from_parts(collection, point.id.as_ref()?, &point.payload)
}

fn retrieved_to_fact(collection: Collection, point: &qdrant_client::qdrant::RetrievedPoint) -> Option<Fact> {
    fact_from_parts(collection, point.id.as_ref()?, &point.payload)
}

fn fact_from_parts(
    collection: Collection,
    point_id: &PointId,
    payload: &HashMap<String, QdrantValue>,
) -> Option<Fact> {
    let id = match point_id.point_id_options.as_ref()? {
        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => u.clone(),
        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n.to_string(),
    };

    let get_str = |k: &str| payload.get(k).and_then(|v| v.as_str()).unwrap_or("").to_string();
    let reserved = [collection.owner_field(), collection.name_field(), "text", "created_at"];
    let metadata = payload
        .iter()
        .filter(|(k, _)| !reserved.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
        .collect();

    Some(Fact {
        id,
        owner_id: get_str(collection.owner_field()),
        name: get_str(collection.name_field()),
        text: get_str("text"),
        dense: Vec::new(),
        sparse: SparseVector::default(),
        created_at: payload
            .get("created_at")
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
        metadata,
    })
}

fn qdrant_value_to_json(v: &QdrantValue) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind;
    match &v.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => serde_json::json!(i),
        Some(Kind::DoubleValue(d)) => serde_json::json!(d),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FilterExpr;

    #[test]
    fn rrf_merge_sums_overlapping_hits() {
        // Two empty ScoredPoint lists: merge is well-defined (empty) and
        // does not panic.
        let merged = rrf_merge(Collection::People, Vec::new(), Vec::new(), 5);
        assert!(merged.is_empty());
    }

    #[test]
    fn filter_builder_handles_empty() {
        let f = FilterExpr::new();
        let built = build_qdrant_filter(&f).unwrap();
        assert!(built.must.is_empty());
    }
}
