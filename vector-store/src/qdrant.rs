use crate::document::{canonical_string, CodeDocument, VectorDocument};
use crate::error::{Result, VectorStoreError};
use crate::filter::{FieldCondition, Filter};
use crate::store::{point_id, QueryVector, ScoredPoint, SearchOptions, VectorStore};
use async_trait::async_trait;
use log::{debug, info};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Points are upserted in batches of this size, one awaited request per
/// batch
pub const INSERT_BATCH_SIZE: usize = 100;

/// Connection settings for a Qdrant instance
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL, e.g. `http://127.0.0.1:6333`
    pub url: String,

    /// Optional API key sent with every request
    pub api_key: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self::local()
    }
}

impl QdrantConfig {
    /// Connect to a Qdrant running on localhost with the default port
    pub fn local() -> Self {
        Self {
            url: "http://127.0.0.1:6333".to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Connect to a remote Qdrant
    pub fn remote(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: Some(api_key.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Vector store backed by the Qdrant REST API.
///
/// Caller-chosen string ids are mapped to UUID point ids with
/// [`point_id`]; the original id always travels in the payload under `id`.
/// All remote calls honor the configured cancellation token.
pub struct QdrantStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    cancel: CancellationToken,
    dimensions: RwLock<HashMap<String, usize>>,
}

impl QdrantStore {
    /// Create a store from connection settings
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            cancel: CancellationToken::new(),
            dimensions: RwLock::new(HashMap::new()),
        })
    }

    /// Attach a caller-supplied cancellation token. In-flight requests are
    /// abandoned when the token fires and the pending call returns
    /// `Canceled`.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        let encoded = utf8_percent_encode(collection, NON_ALPHANUMERIC);
        format!("{}/collections/{encoded}{suffix}", self.base_url)
    }

    /// Send a request, translating transport failures, non-success
    /// statuses, and cancellation into their error kinds.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let request = match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        };

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(VectorStoreError::Canceled),
            response = request.send() => response?,
        };

        let status = response.status();
        let body = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(VectorStoreError::Canceled),
            body = response.text() => body?,
        };

        if !status.is_success() {
            return Err(VectorStoreError::BackendRejected {
                status: status.as_u16(),
                body,
            });
        }
        if body.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(serde_json::from_str(&body)?)
        }
    }

    async fn expected_dimension(&self, collection: &str) -> Option<usize> {
        self.dimensions.read().await.get(collection).copied()
    }

    async fn remember_dimension(&self, collection: &str, dimension: usize) {
        self.dimensions
            .write()
            .await
            .insert(collection.to_string(), dimension);
    }

    async fn validate_dimensions(
        &self,
        collection: &str,
        documents: &[VectorDocument],
    ) -> Result<()> {
        let mut expected = self.expected_dimension(collection).await;
        for document in documents {
            match expected {
                Some(dimension) if document.vector.len() != dimension => {
                    return Err(VectorStoreError::InvalidArgument(format!(
                        "dense vector for '{}' has dimension {}, collection '{collection}' expects {dimension}",
                        document.document.id,
                        document.vector.len(),
                    )));
                }
                Some(_) => {}
                None => expected = Some(document.vector.len()),
            }
        }
        Ok(())
    }

    async fn insert_points(
        &self,
        collection: &str,
        documents: Vec<VectorDocument>,
        hybrid: bool,
    ) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.validate_dimensions(collection, &documents).await?;

        info!(
            "upserting {} points into '{collection}' ({} mode)",
            documents.len(),
            if hybrid { "hybrid" } else { "dense" }
        );

        let url = self.collection_url(collection, "/points?wait=true");
        for (batch, chunk) in documents.chunks(INSERT_BATCH_SIZE).enumerate() {
            let points: Vec<Value> = chunk
                .iter()
                .map(|document| point_json(document, hybrid))
                .collect();
            let body = json!({ "points": points });

            self.execute(self.http.put(&url).json(&body))
                .await
                .map_err(|source| VectorStoreError::BatchInsert {
                    batch,
                    source: Box::new(source),
                })?;
            debug!("batch {batch}: upserted {} points", chunk.len());
        }
        Ok(())
    }
}

fn point_json(document: &VectorDocument, hybrid: bool) -> Value {
    let payload = serde_json::to_value(&document.document).unwrap_or(Value::Null);
    let vector = if hybrid {
        let mut named = serde_json::Map::new();
        named.insert("dense".to_string(), json!(document.vector));
        if let Some(sparse) = &document.sparse_vector {
            if !sparse.is_empty() {
                named.insert(
                    "sparse".to_string(),
                    json!({ "indices": sparse.indices, "values": sparse.values }),
                );
            }
        }
        Value::Object(named)
    } else {
        json!(document.vector)
    };

    json!({
        "id": point_id(&document.document.id),
        "vector": vector,
        "payload": payload,
    })
}

fn query_json(vector: &QueryVector) -> Value {
    match vector {
        QueryVector::Dense(values) => json!(values),
        QueryVector::Sparse(sparse) => {
            json!({ "indices": sparse.indices, "values": sparse.values })
        }
    }
}

fn filter_json(filter: &Filter) -> Value {
    fn condition_json(condition: &FieldCondition) -> Value {
        json!({ "key": condition.field, "match": { "value": condition.value } })
    }
    match filter {
        Filter::Must(condition) => json!({ "must": [condition_json(condition)] }),
        Filter::MustNot(condition) => json!({ "must_not": [condition_json(condition)] }),
        Filter::Any(conditions) => {
            let should: Vec<Value> = conditions.iter().map(condition_json).collect();
            json!({ "should": should })
        }
    }
}

/// Rebuild a payload document leniently; a missing payload id falls back to
/// the backend point id.
fn document_from_payload(backend_id: &str, payload: &Value) -> CodeDocument {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let line = |key: &str| payload.get(key).and_then(Value::as_u64).unwrap_or(0) as u32;

    let mut id = text("id");
    if id.is_empty() {
        id = backend_id.to_string();
    }
    let metadata = payload
        .get("metadata")
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    CodeDocument {
        id,
        content: text("content"),
        relative_path: text("relativePath"),
        start_line: line("startLine"),
        end_line: line("endLine"),
        file_extension: text("fileExtension"),
        metadata,
    }
}

fn backend_id_string(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn has_collection(&self, collection: &str) -> Result<bool> {
        let url = self.collection_url(collection, "/exists");
        let response = self.execute(self.http.get(&url)).await?;
        Ok(response
            .pointer("/result/exists")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        info!("creating collection '{collection}' (dim {dimension})");
        let url = self.collection_url(collection, "");
        let body = json!({
            "vectors": { "size": dimension, "distance": "Cosine" },
        });
        self.execute(self.http.put(&url).json(&body)).await?;
        self.remember_dimension(collection, dimension).await;
        Ok(())
    }

    async fn create_hybrid_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        info!("creating hybrid collection '{collection}' (dim {dimension})");
        let url = self.collection_url(collection, "");
        let body = json!({
            "vectors": { "dense": { "size": dimension, "distance": "Cosine" } },
            "sparse_vectors": { "sparse": {} },
        });
        self.execute(self.http.put(&url).json(&body)).await?;
        self.remember_dimension(collection, dimension).await;
        Ok(())
    }

    async fn insert(&self, collection: &str, documents: Vec<VectorDocument>) -> Result<()> {
        self.insert_points(collection, documents, false).await
    }

    async fn insert_hybrid(&self, collection: &str, documents: Vec<VectorDocument>) -> Result<()> {
        self.insert_points(collection, documents, true).await
    }

    async fn search(
        &self,
        collection: &str,
        channel: Option<&str>,
        vector: &QueryVector,
        options: &SearchOptions,
    ) -> Result<Vec<ScoredPoint>> {
        let url = self.collection_url(collection, "/points/query");
        let mut body = json!({
            "query": query_json(vector),
            "limit": options.limit,
            "with_payload": true,
        });
        if let Some(channel) = channel {
            body["using"] = json!(channel);
        }
        if let Some(filter) = &options.filter {
            body["filter"] = filter_json(filter);
        }

        let response = self.execute(self.http.post(&url).json(&body)).await?;
        let points = response
            .pointer("/result/points")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let results = points
            .iter()
            .map(|point| {
                let backend_id =
                    backend_id_string(point.get("id").unwrap_or(&Value::Null));
                let score = point
                    .get("score")
                    .and_then(Value::as_f64)
                    .unwrap_or_default() as f32;
                let empty = Value::Null;
                let payload = point.get("payload").unwrap_or(&empty);
                ScoredPoint {
                    document: document_from_payload(&backend_id, payload),
                    point_id: backend_id,
                    score,
                }
            })
            .collect();
        Ok(results)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        fields: &[&str],
        limit: usize,
    ) -> Result<Vec<HashMap<String, String>>> {
        let url = self.collection_url(collection, "/points/scroll");
        let mut body = json!({
            "limit": limit,
            "with_vector": false,
        });
        body["with_payload"] = if fields.is_empty() {
            json!(true)
        } else {
            json!({ "include": fields })
        };
        if let Some(filter) = filter {
            body["filter"] = filter_json(filter);
        }

        let response = self.execute(self.http.post(&url).json(&body)).await?;
        let points = response
            .pointer("/result/points")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(points.len());
        for point in &points {
            let Some(payload) = point.get("payload").and_then(Value::as_object) else {
                continue;
            };
            let mut row = HashMap::new();
            if fields.is_empty() {
                for (key, value) in payload {
                    row.insert(key.clone(), canonical_string(value));
                }
            } else {
                for field in fields {
                    if let Some(value) = payload.get(*field) {
                        row.insert((*field).to_string(), canonical_string(value));
                    }
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.collection_url(collection, "/points/delete?wait=true");
        let mapped: Vec<String> = ids.iter().map(|id| point_id(id)).collect();
        let body = json!({ "points": mapped });
        self.execute(self.http.post(&url).json(&body)).await?;
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        info!("dropping collection '{collection}'");
        let url = self.collection_url(collection, "");
        self.execute(self.http.delete(&url)).await?;
        self.dimensions.write().await.remove(collection);
        Ok(())
    }

    async fn is_hybrid(&self, collection: &str) -> Result<bool> {
        let url = self.collection_url(collection, "");
        let response = self.execute(self.http.get(&url)).await?;
        let vectors = response.pointer("/result/config/params/vectors");

        // Named-vector collections describe each vector under its name; a
        // single-vector collection has `size` directly.
        let hybrid = vectors
            .and_then(Value::as_object)
            .is_some_and(|config| config.contains_key("dense"));

        let dimension = if hybrid {
            response
                .pointer("/result/config/params/vectors/dense/size")
                .and_then(Value::as_u64)
        } else {
            response
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64)
        };
        if let Some(dimension) = dimension {
            self.remember_dimension(collection, dimension as usize).await;
        }

        Ok(hybrid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quarry_sparse::SparseVector;

    fn sample_document() -> VectorDocument {
        let document = CodeDocument::new("src/lib.rs:1-4", "src/lib.rs", 1, 4, "pub fn lib() {}");
        VectorDocument::new(document, vec![0.1, 0.2, 0.3])
            .with_sparse(SparseVector::new(vec![2, 7], vec![0.5, 1.5]))
    }

    #[test]
    fn test_point_json_dense_mode() {
        let point = point_json(&sample_document(), false);
        assert_eq!(point["vector"], json!([0.1f32, 0.2f32, 0.3f32]));
        assert_eq!(point["payload"]["id"], json!("src/lib.rs:1-4"));
        assert_eq!(point["id"], json!(point_id("src/lib.rs:1-4")));
    }

    #[test]
    fn test_point_json_hybrid_mode() {
        let point = point_json(&sample_document(), true);
        assert_eq!(point["vector"]["dense"], json!([0.1f32, 0.2f32, 0.3f32]));
        assert_eq!(point["vector"]["sparse"]["indices"], json!([2, 7]));
        assert_eq!(point["vector"]["sparse"]["values"], json!([0.5f32, 1.5f32]));
    }

    #[test]
    fn test_point_json_omits_empty_sparse_vector() {
        let mut document = sample_document();
        document.sparse_vector = Some(SparseVector::empty());
        let point = point_json(&document, true);
        assert!(point["vector"].get("sparse").is_none());
        assert!(point["vector"].get("dense").is_some());
    }

    #[test]
    fn test_filter_json_shapes() {
        let must = Filter::Must(FieldCondition {
            field: "status".into(),
            value: "active".into(),
        });
        assert_eq!(
            filter_json(&must),
            json!({ "must": [{ "key": "status", "match": { "value": "active" } }] })
        );

        let any = Filter::Any(vec![
            FieldCondition {
                field: "fileExtension".into(),
                value: ".ts".into(),
            },
            FieldCondition {
                field: "fileExtension".into(),
                value: ".py".into(),
            },
        ]);
        let rendered = filter_json(&any);
        assert_eq!(rendered["should"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_document_from_payload_round_trip() {
        let original = sample_document().document;
        let payload = serde_json::to_value(&original).unwrap();
        let rebuilt = document_from_payload("backend-uuid", &payload);
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_document_from_payload_falls_back_to_backend_id() {
        let rebuilt = document_from_payload("backend-uuid", &json!({ "content": "x" }));
        assert_eq!(rebuilt.id, "backend-uuid");
        assert_eq!(rebuilt.content, "x");
    }

    #[test]
    fn test_query_json_variants() {
        let dense = query_json(&QueryVector::Dense(vec![1.0, 2.0]));
        assert_eq!(dense, json!([1.0f32, 2.0f32]));

        let sparse = query_json(&QueryVector::Sparse(SparseVector::new(
            vec![4],
            vec![0.25],
        )));
        assert_eq!(sparse, json!({ "indices": [4], "values": [0.25f32] }));
    }

    #[tokio::test]
    async fn test_pre_canceled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let store = QdrantStore::new(QdrantConfig {
            url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap()
        .with_cancellation(cancel);

        let err = store.has_collection("anything").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Canceled));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_invalid_argument() {
        let store = QdrantStore::new(QdrantConfig::local()).unwrap();
        store.remember_dimension("code", 4).await;

        let err = store
            .insert("code", vec![sample_document()])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidArgument(_)));
    }
}
