use crate::document::{CodeDocument, VectorDocument};
use crate::error::Result;
use crate::filter::Filter;
use async_trait::async_trait;
use quarry_sparse::SparseVector;
use std::collections::HashMap;
use uuid::Uuid;

/// Name of the dense channel in hybrid collections
pub const DENSE_CHANNEL: &str = "dense";

/// Name of the sparse channel in hybrid collections
pub const SPARSE_CHANNEL: &str = "sparse";

/// Default number of results returned when the caller does not say
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Map a caller-chosen document id to a backend point id.
///
/// Pure function of the input string: the same id always maps to the same
/// UUID-shaped point id, across processes and runs. The original id is kept
/// in the payload under `id` and remains the authoritative identifier.
pub fn point_id(id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
}

/// Query vector for one channel
#[derive(Debug, Clone, PartialEq)]
pub enum QueryVector {
    Dense(Vec<f32>),
    Sparse(SparseVector),
}

/// Options for a single-channel search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results
    pub limit: usize,

    /// Optional payload filter
    pub filter: Option<Filter>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            filter: None,
        }
    }
}

/// One search hit: the stored payload plus the raw channel score
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Backend point id (the mapped form, not the caller id)
    pub point_id: String,

    /// Raw similarity score from the queried channel
    pub score: f32,

    /// The stored payload
    pub document: CodeDocument,
}

/// Backend-neutral vector store operations.
///
/// Implementations are expected to be cheap to share (`&self` methods,
/// internally synchronized) and safe for concurrent use.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// True if the collection exists
    async fn has_collection(&self, collection: &str) -> Result<bool>;

    /// Create a single-vector collection of the given dimension
    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Create a hybrid collection: a dense vector named `"dense"` of the
    /// given dimension with cosine distance, plus a sparse vector named
    /// `"sparse"`
    async fn create_hybrid_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Insert documents into a single-vector collection
    async fn insert(&self, collection: &str, documents: Vec<VectorDocument>) -> Result<()>;

    /// Insert documents (dense plus optional sparse) into a hybrid
    /// collection
    async fn insert_hybrid(&self, collection: &str, documents: Vec<VectorDocument>) -> Result<()>;

    /// Search one channel. `channel` is the named vector to query, or
    /// `None` for the single unnamed vector of a non-hybrid collection.
    async fn search(
        &self,
        collection: &str,
        channel: Option<&str>,
        vector: &QueryVector,
        options: &SearchOptions,
    ) -> Result<Vec<ScoredPoint>>;

    /// Scroll payloads matching `filter`, returning the requested fields by
    /// name. Object-valued fields are rendered in a canonical string form.
    async fn scroll(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        fields: &[&str],
        limit: usize,
    ) -> Result<Vec<HashMap<String, String>>>;

    /// Delete documents by their caller-chosen ids
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// Drop the collection and everything in it
    async fn drop_collection(&self, collection: &str) -> Result<()>;

    /// True if the collection was created with named vectors (its vector
    /// configuration names a `"dense"` vector)
    async fn is_hybrid(&self, collection: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_point_id_is_deterministic() {
        assert_eq!(point_id("src/main.rs:1-20"), point_id("src/main.rs:1-20"));
        assert_ne!(point_id("src/main.rs:1-20"), point_id("src/main.rs:21-40"));
    }

    #[test]
    fn test_point_id_is_uuid_shaped() {
        let id = point_id("any caller id");
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_point_id_total_on_unusual_input() {
        // Any string maps somewhere, including empty and non-ASCII ids
        assert!(Uuid::parse_str(&point_id("")).is_ok());
        assert!(Uuid::parse_str(&point_id("päth/ütf8.rs")).is_ok());
    }
}
