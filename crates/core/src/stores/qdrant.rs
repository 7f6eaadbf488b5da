use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::ChunkRecord;
use crate::traits::DocumentStore;

const BACKEND: &str = "qdrant";

/// Qdrant-backed document store. One collection holds every chunk record;
/// the record's filename and page index live in the point payload, and the
/// point id minted at insert time becomes the record's store-assigned id.
pub struct QdrantDocumentStore {
    client: Client,
    base_url: Url,
    collection: String,
    vector_size: usize,
    search_candidates: usize,
}

impl QdrantDocumentStore {
    /// `vector_size` must match the embedding provider's dimensionality;
    /// `search_candidates` is the candidate pool the index considers per
    /// search before returning the top results.
    pub fn connect(
        endpoint: &str,
        collection: impl Into<String>,
        vector_size: usize,
        search_candidates: usize,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(endpoint)?,
            collection: collection.into(),
            vector_size,
            search_candidates,
        })
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, StoreError> {
        Ok(self
            .base_url
            .join(&format!("collections/{}{}", self.collection, suffix))?)
    }

    /// Create the collection when it does not exist yet. An existing
    /// collection is left untouched; a size mismatch surfaces on insert.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let response = self.client.get(self.collection_url("")?).send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        if !response.status().is_client_error() {
            return Err(rejected(response).await);
        }

        let response = self
            .client
            .put(self.collection_url("")?)
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        info!(collection = %self.collection, size = self.vector_size, "created collection");
        Ok(())
    }
}

async fn rejected(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let details = response.text().await.unwrap_or_default();
    StoreError::Rejected {
        backend: BACKEND.to_string(),
        details: format!("{status}: {details}"),
    }
}

fn filename_filter(filename: &str) -> Value {
    json!({
        "must": [{
            "key": "filename",
            "match": { "value": filename },
        }]
    })
}

fn record_from_hit(hit: &Value) -> ChunkRecord {
    let id = hit
        .pointer("/id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            hit.pointer("/id")
                .and_then(Value::as_u64)
                .map(|id| id.to_string())
        });

    let embedding = hit
        .pointer("/vector")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_f64)
                .map(|value| value as f32)
                .collect()
        })
        .unwrap_or_default();

    ChunkRecord {
        text: hit
            .pointer("/payload/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        embedding,
        filename: hit
            .pointer("/payload/filename")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        chunk_id: hit
            .pointer("/payload/chunk_id")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        id,
    }
}

#[async_trait]
impl DocumentStore for QdrantDocumentStore {
    async fn insert_many(&self, records: Vec<ChunkRecord>) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let ingested_at = Utc::now().to_rfc3339();
        let mut points = Vec::with_capacity(records.len());
        for record in &records {
            if record.embedding.len() != self.vector_size {
                return Err(StoreError::Rejected {
                    backend: BACKEND.to_string(),
                    details: format!(
                        "embedding dimension {} does not match collection size {}",
                        record.embedding.len(),
                        self.vector_size
                    ),
                });
            }

            points.push(json!({
                "id": Uuid::new_v4().to_string(),
                "vector": record.embedding,
                "payload": {
                    "text": record.text,
                    "filename": record.filename,
                    "chunk_id": record.chunk_id,
                    "ingested_at": ingested_at,
                },
            }));
        }

        let response = self
            .client
            .put(self.collection_url("/points?wait=true")?)
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        debug!(count = records.len(), "inserted chunk records");
        Ok(records.len())
    }

    async fn vector_search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkRecord>, StoreError> {
        if query_vector.len() != self.vector_size {
            return Err(StoreError::Rejected {
                backend: BACKEND.to_string(),
                details: format!(
                    "query vector dimension {} does not match collection size {}",
                    query_vector.len(),
                    self.vector_size
                ),
            });
        }

        let response = self
            .client
            .post(self.collection_url("/points/search")?)
            .json(&json!({
                "vector": query_vector,
                "limit": limit,
                "with_payload": true,
                "with_vector": true,
                "params": { "hnsw_ef": self.search_candidates },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        debug!(hits = hits.len(), limit, "vector search returned");
        Ok(hits.iter().map(record_from_hit).collect())
    }

    async fn count_documents(&self) -> Result<u64, StoreError> {
        let response = self
            .client
            .post(self.collection_url("/points/count")?)
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    async fn delete_by_filename(&self, filename: &str) -> Result<u64, StoreError> {
        let filter = filename_filter(filename);

        // The delete endpoint reports only an operation status, so count
        // the exact matches first and report that number.
        let response = self
            .client
            .post(self.collection_url("/points/count")?)
            .json(&json!({ "filter": filter, "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let parsed: Value = response.json().await?;
        let matched = parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        if matched == 0 {
            return Ok(0);
        }

        let response = self
            .client
            .post(self.collection_url("/points/delete?wait=true")?)
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        info!(filename, deleted = matched, "deleted chunk records");
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::{filename_filter, record_from_hit, QdrantDocumentStore};
    use crate::error::StoreError;
    use crate::models::ChunkRecord;
    use crate::traits::DocumentStore;
    use serde_json::json;

    fn store(vector_size: usize) -> QdrantDocumentStore {
        QdrantDocumentStore::connect("http://localhost:6333", "documents", vector_size, 50)
            .expect("endpoint should parse")
    }

    #[test]
    fn invalid_endpoint_is_rejected_at_connect() {
        let result = QdrantDocumentStore::connect("not a url", "documents", 3, 50);
        assert!(matches!(result, Err(StoreError::Url(_))));
    }

    #[test]
    fn hits_map_back_to_chunk_records() {
        let hit = json!({
            "id": "6f1c9c6e-8f7d-4b9e-b8e6-2f1a2b3c4d5e",
            "score": 0.87,
            "vector": [0.25, -0.5, 0.1],
            "payload": {
                "text": "Alpha page",
                "filename": "report.pdf",
                "chunk_id": 2,
                "ingested_at": "2025-06-01T12:00:00+00:00",
            },
        });

        let record = record_from_hit(&hit);
        assert_eq!(record.text, "Alpha page");
        assert_eq!(record.filename, "report.pdf");
        assert_eq!(record.chunk_id, 2);
        assert_eq!(record.embedding.len(), 3);
        assert_eq!(
            record.id.as_deref(),
            Some("6f1c9c6e-8f7d-4b9e-b8e6-2f1a2b3c4d5e")
        );
    }

    #[test]
    fn filename_filter_matches_exact_value() {
        let filter = filename_filter("report.pdf");
        assert_eq!(
            filter.pointer("/must/0/match/value").and_then(|v| v.as_str()),
            Some("report.pdf")
        );
    }

    #[tokio::test]
    async fn empty_insert_is_a_no_op() {
        let stored = store(3)
            .insert_many(Vec::new())
            .await
            .expect("empty insert should succeed");
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected_before_sending() {
        let record = ChunkRecord::new("text", vec![0.1, 0.2], "a.pdf", 0);
        let result = store(3).insert_many(vec![record]).await;
        assert!(matches!(result, Err(StoreError::Rejected { .. })));
    }

    #[tokio::test]
    async fn query_dimension_mismatch_is_rejected_before_sending() {
        let result = store(3).vector_search(&[0.1, 0.2, 0.3, 0.4], 5).await;
        assert!(matches!(result, Err(StoreError::Rejected { .. })));
    }
}
