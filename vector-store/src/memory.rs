use crate::document::{canonical_string, CodeDocument, VectorDocument};
use crate::error::{Result, VectorStoreError};
use crate::filter::Filter;
use crate::store::{point_id, QueryVector, ScoredPoint, SearchOptions, VectorStore};
use async_trait::async_trait;
use log::{debug, info};
use quarry_sparse::SparseVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    point_id: String,
    document: CodeDocument,
    vector: Vec<f32>,
    sparse_vector: Option<SparseVector>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Collection {
    dimension: usize,
    hybrid: bool,
    points: Vec<StoredPoint>,
}

/// In-memory vector store with optional JSON persistence.
///
/// Implements the full [`VectorStore`] port with exact scoring: cosine
/// similarity on the dense channel and sparse dot product on the sparse
/// channel. Useful for local development and as the backend of the
/// integration test suite; it is not built for large corpora.
pub struct MemoryStore {
    path: Option<PathBuf>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, purely in-memory store
    pub fn new() -> Self {
        Self {
            path: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Open a store backed by a JSON file, loading existing data if the
    /// file is present. Every mutation rewrites the file.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let collections = if path.exists() {
            let content = tokio::fs::read(path).await?;
            match serde_json::from_slice(&content) {
                Ok(data) => data,
                Err(err) => {
                    debug!("could not load existing data: {err}, starting fresh");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        info!("memory store opened at {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            collections: RwLock::new(collections),
        })
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let collections = self.collections.read().await;
        let content = serde_json::to_vec(&*collections)?;
        tokio::fs::write(path, content).await?;
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

        {
            let mut collections = self.collections.write().await;
            let entry = collections
                .entry(collection.to_string())
                .or_insert_with(|| Collection {
                    dimension: documents[0].vector.len(),
                    hybrid,
                    points: Vec::new(),
                });

            for document in documents {
                if document.vector.len() != entry.dimension {
                    return Err(VectorStoreError::InvalidArgument(format!(
                        "dense vector for '{}' has dimension {}, collection '{collection}' expects {}",
                        document.document.id,
                        document.vector.len(),
                        entry.dimension,
                    )));
                }
                let point_id = point_id(&document.document.id);
                entry.points.retain(|point| point.point_id != point_id);
                entry.points.push(StoredPoint {
                    point_id,
                    document: document.document,
                    vector: document.vector,
                    sparse_vector: document.sparse_vector,
                });
            }
        }

        self.persist().await
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

fn document_field(document: &CodeDocument, field: &str) -> Option<String> {
    document.field(field).map(|value| canonical_string(&value))
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn has_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        self.collections.write().await.insert(
            collection.to_string(),
            Collection {
                dimension,
                hybrid: false,
                points: Vec::new(),
            },
        );
        self.persist().await
    }

    async fn create_hybrid_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        self.collections.write().await.insert(
            collection.to_string(),
            Collection {
                dimension,
                hybrid: true,
                points: Vec::new(),
            },
        );
        self.persist().await
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
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Err(VectorStoreError::InvalidArgument(format!(
                "collection '{collection}' does not exist"
            )));
        };

        if let QueryVector::Dense(query) = vector {
            if query.len() != entry.dimension {
                return Err(VectorStoreError::InvalidArgument(format!(
                    "query dimension {} does not match collection dimension {}",
                    query.len(),
                    entry.dimension,
                )));
            }
        }
        debug!(
            "searching '{collection}' channel {:?} over {} points",
            channel,
            entry.points.len()
        );

        let mut results: Vec<ScoredPoint> = entry
            .points
            .iter()
            .filter(|point| match &options.filter {
                Some(filter) => filter.matches(|field| document_field(&point.document, field)),
                None => true,
            })
            .filter_map(|point| {
                let score = match vector {
                    QueryVector::Dense(query) => cosine_similarity(query, &point.vector),
                    QueryVector::Sparse(query) => point
                        .sparse_vector
                        .as_ref()
                        .map(|sparse| query.dot(sparse))?,
                };
                if score <= 0.0 {
                    return None;
                }
                Some(ScoredPoint {
                    point_id: point.point_id.clone(),
                    score,
                    document: point.document.clone(),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(options.limit);
        Ok(results)
    }

    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        fields: &[&str],
        limit: usize,
    ) -> Result<Vec<HashMap<String, String>>> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let rows = entry
            .points
            .iter()
            .filter(|point| match filter {
                Some(filter) => filter.matches(|field| document_field(&point.document, field)),
                None => true,
            })
            .take(limit)
            .map(|point| {
                let mut row = HashMap::new();
                for field in fields {
                    if let Some(value) = document_field(&point.document, field) {
                        row.insert((*field).to_string(), value);
                    }
                }
                row
            })
            .collect();
        Ok(rows)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        {
            let mut collections = self.collections.write().await;
            let Some(entry) = collections.get_mut(collection) else {
                return Ok(());
            };
            let mapped: Vec<String> = ids.iter().map(|id| point_id(id)).collect();
            entry.points.retain(|point| !mapped.contains(&point.point_id));
        }
        self.persist().await
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        self.persist().await
    }

    async fn is_hybrid(&self, collection: &str) -> Result<bool> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|entry| entry.hybrid)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn document(id: &str, path: &str, content: &str) -> CodeDocument {
        CodeDocument::new(id, path, 1, 10, content)
    }

    fn dense_only(id: &str, path: &str, vector: Vec<f32>) -> VectorDocument {
        VectorDocument::new(document(id, path, "fn body() {}"), vector)
    }

    #[tokio::test]
    async fn test_create_and_detect_collections() {
        let store = MemoryStore::new();
        store.create_collection("plain", 3).await.unwrap();
        store.create_hybrid_collection("hybrid", 3).await.unwrap();

        assert!(store.has_collection("plain").await.unwrap());
        assert!(!store.is_hybrid("plain").await.unwrap());
        assert!(store.is_hybrid("hybrid").await.unwrap());
        assert!(!store.has_collection("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_dense_search_ranks_by_similarity() {
        let store = MemoryStore::new();
        store.create_collection("code", 2).await.unwrap();
        store
            .insert(
                "code",
                vec![
                    dense_only("a", "a.rs", vec![1.0, 0.0]),
                    dense_only("b", "b.rs", vec![0.0, 1.0]),
                    dense_only("c", "c.rs", vec![0.7, 0.7]),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search(
                "code",
                None,
                &QueryVector::Dense(vec![1.0, 0.0]),
                &SearchOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(results[0].document.id, "a");
        assert_eq!(results[1].document.id, "c");
        // b is orthogonal to the query and never surfaces
        assert!(results.iter().all(|point| point.document.id != "b"));
    }

    #[tokio::test]
    async fn test_sparse_search_uses_dot_product() {
        let store = MemoryStore::new();
        store.create_hybrid_collection("code", 2).await.unwrap();
        store
            .insert_hybrid(
                "code",
                vec![
                    dense_only("a", "a.rs", vec![1.0, 0.0])
                        .with_sparse(SparseVector::new(vec![1], vec![2.0])),
                    dense_only("b", "b.rs", vec![0.0, 1.0])
                        .with_sparse(SparseVector::new(vec![2], vec![5.0])),
                ],
            )
            .await
            .unwrap();

        let results = store
            .search(
                "code",
                Some("sparse"),
                &QueryVector::Sparse(SparseVector::new(vec![1], vec![1.0])),
                &SearchOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "a");
        assert_eq!(results[0].score, 2.0);
    }

    #[tokio::test]
    async fn test_search_applies_filter() {
        let store = MemoryStore::new();
        store.create_collection("code", 2).await.unwrap();
        store
            .insert(
                "code",
                vec![
                    dense_only("a", "a.rs", vec![1.0, 0.0]),
                    dense_only("b", "b.py", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let options = SearchOptions {
            filter: parse_filter("fileExtension == .py"),
            ..Default::default()
        };
        let results = store
            .search("code", None, &QueryVector::Dense(vec![1.0, 0.0]), &options)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "b");
    }

    #[tokio::test]
    async fn test_insert_rejects_dimension_mismatch() {
        let store = MemoryStore::new();
        store.create_collection("code", 3).await.unwrap();

        let err = store
            .insert("code", vec![dense_only("a", "a.rs", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_insert_upserts_by_id() {
        let store = MemoryStore::new();
        store.create_collection("code", 2).await.unwrap();
        store
            .insert("code", vec![dense_only("a", "a.rs", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .insert("code", vec![dense_only("a", "a.rs", vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store
            .search(
                "code",
                None,
                &QueryVector::Dense(vec![0.0, 1.0]),
                &SearchOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_scroll_returns_requested_fields() {
        let store = MemoryStore::new();
        store.create_collection("code", 2).await.unwrap();
        store
            .insert("code", vec![dense_only("a", "src/a.rs", vec![1.0, 0.0])])
            .await
            .unwrap();

        let rows = store
            .scroll("code", None, &["id", "relativePath", "startLine"], 10)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "a");
        assert_eq!(rows[0]["relativePath"], "src/a.rs");
        assert_eq!(rows[0]["startLine"], "1");
    }

    #[tokio::test]
    async fn test_delete_by_caller_id() {
        let store = MemoryStore::new();
        store.create_collection("code", 2).await.unwrap();
        store
            .insert(
                "code",
                vec![
                    dense_only("a", "a.rs", vec![1.0, 0.0]),
                    dense_only("b", "b.rs", vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        store.delete("code", &["a".to_string()]).await.unwrap();

        let rows = store.scroll("code", None, &["id"], 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "b");
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("store.json");

        {
            let store = MemoryStore::open(&path).await.unwrap();
            store.create_hybrid_collection("code", 2).await.unwrap();
            store
                .insert_hybrid("code", vec![dense_only("a", "a.rs", vec![1.0, 0.0])])
                .await
                .unwrap();
        }

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert!(reopened.has_collection("code").await.unwrap());
        assert!(reopened.is_hybrid("code").await.unwrap());
        let rows = reopened.scroll("code", None, &["id"], 10).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_drop_collection() {
        let store = MemoryStore::new();
        store.create_collection("code", 2).await.unwrap();
        store.drop_collection("code").await.unwrap();
        assert!(!store.has_collection("code").await.unwrap());
    }
}
