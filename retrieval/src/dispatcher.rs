use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::fusion::fuse;
use crate::rerank::{RerankDocument, RerankOptions, Reranker};
use crate::result::HybridSearchResult;
use log::{debug, info, warn};
use quarry_sparse::SparseVector;
use quarry_vector_store::{
    Filter, QueryVector, SearchOptions, VectorStore, DEFAULT_SEARCH_LIMIT, DENSE_CHANNEL,
    SPARSE_CHANNEL,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Query payload of one channel request
#[derive(Debug, Clone)]
pub enum QueryData {
    Dense(Vec<f32>),
    Sparse(SparseVector),
    /// Raw query text. Not supported by the dispatcher (embedding happens
    /// upstream); such requests are skipped with a warning.
    Text(String),
}

/// One per-channel search request
#[derive(Debug, Clone)]
pub struct HybridSearchRequest {
    pub data: QueryData,

    /// Explicit channel name. Optional: the dispatcher routes by data
    /// shape, and a name containing `"sparse"` forces the sparse channel.
    pub channel: Option<String>,

    /// Per-channel result count; the fused list is truncated to the
    /// largest limit across requests
    pub limit: usize,
}

impl HybridSearchRequest {
    /// Dense request with the default limit
    pub fn dense(vector: Vec<f32>) -> Self {
        Self {
            data: QueryData::Dense(vector),
            channel: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Sparse request with the default limit
    pub fn sparse(vector: SparseVector) -> Self {
        Self {
            data: QueryData::Sparse(vector),
            channel: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Address a named channel explicitly
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Override the result count
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Options for one `hybrid_search` call
#[derive(Debug, Clone, Default)]
pub struct HybridSearchOptions {
    /// Original query text, used by the rerank stage when one is
    /// configured
    pub query_text: Option<String>,

    /// Payload filter applied to every channel
    pub filter: Option<Filter>,
}

struct RerankStage {
    reranker: Arc<dyn Reranker>,
    options: RerankOptions,
}

/// Coordinates multi-channel search against a [`VectorStore`].
///
/// Normalizes channel addressing between hybrid (named-vector) and
/// single-vector collections, runs the per-request searches, fuses the
/// rankings, and optionally hands the top of the fused list to a
/// [`Reranker`].
///
/// The only internal state is a per-collection hybrid-mode cache. The cache
/// is monotonic for the process lifetime; recreating a collection with a
/// different schema requires a new dispatcher.
pub struct HybridDispatcher {
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
    rerank: Option<RerankStage>,
    hybrid_modes: RwLock<HashMap<String, bool>>,
}

impl HybridDispatcher {
    /// Create a dispatcher over a store
    pub fn new(store: Arc<dyn VectorStore>, config: RetrievalConfig) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(Self {
            store,
            config,
            rerank: None,
            hybrid_modes: RwLock::new(HashMap::new()),
        })
    }

    /// Attach a second-stage reranker. Rerank failures surface to the
    /// caller; the dispatcher never falls back to the fused ordering.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>, options: RerankOptions) -> Self {
        self.rerank = Some(RerankStage { reranker, options });
        self
    }

    /// Seed the hybrid-mode cache from a configuration hint, avoiding the
    /// introspection round-trip on first use
    pub async fn preload_hybrid_mode(&self, collection: &str, hybrid: bool) {
        self.hybrid_modes
            .write()
            .await
            .insert(collection.to_string(), hybrid);
    }

    async fn collection_is_hybrid(&self, collection: &str) -> Result<bool> {
        if let Some(hybrid) = self.hybrid_modes.read().await.get(collection) {
            return Ok(*hybrid);
        }
        let hybrid = self.store.is_hybrid(collection).await?;
        debug!("collection '{collection}' detected as {}", if hybrid { "hybrid" } else { "non-hybrid" });
        self.hybrid_modes
            .write()
            .await
            .insert(collection.to_string(), hybrid);
        Ok(hybrid)
    }

    /// Run the per-request channel searches and fuse the results.
    ///
    /// Requests carrying text are skipped with a warning; requests carrying
    /// an empty sparse vector are skipped silently. If every request is
    /// skipped, the result is empty and the backend is never contacted.
    pub async fn hybrid_search(
        &self,
        collection: &str,
        requests: &[HybridSearchRequest],
        options: &HybridSearchOptions,
    ) -> Result<Vec<HybridSearchResult>> {
        let mut mode: Option<bool> = None;
        let mut channels = Vec::new();
        let mut limit = 0usize;

        for request in requests {
            let vector = match &request.data {
                QueryData::Text(_) => {
                    warn!("text queries are not supported by hybrid_search; skipping request");
                    continue;
                }
                QueryData::Sparse(sparse) if sparse.is_empty() => continue,
                QueryData::Sparse(sparse) => QueryVector::Sparse(sparse.clone()),
                QueryData::Dense(dense) => QueryVector::Dense(dense.clone()),
            };

            let hybrid = match mode {
                Some(hybrid) => hybrid,
                None => {
                    let hybrid = self.collection_is_hybrid(collection).await?;
                    mode = Some(hybrid);
                    hybrid
                }
            };

            let channel = route_channel(&vector, request.channel.as_deref(), hybrid);
            let search_options = SearchOptions {
                limit: request.limit,
                filter: options.filter.clone(),
            };
            let results = self
                .store
                .search(collection, channel, &vector, &search_options)
                .await?;
            debug!(
                "channel {:?} returned {} results",
                channel,
                results.len()
            );

            limit = limit.max(request.limit);
            channels.push(results);
        }

        if channels.is_empty() {
            return Ok(Vec::new());
        }
        if limit == 0 {
            limit = DEFAULT_SEARCH_LIMIT;
        }

        let fused = fuse(
            &channels,
            self.config.fusion.strategy,
            &self.config.fusion.params,
            limit,
        );
        info!(
            "hybrid search over '{collection}': {} channels fused into {} results",
            channels.len(),
            fused.len()
        );

        match (&self.rerank, options.query_text.as_deref()) {
            (Some(stage), Some(query)) => self.apply_rerank(stage, query, fused).await,
            _ => Ok(fused),
        }
    }

    async fn apply_rerank(
        &self,
        stage: &RerankStage,
        query: &str,
        fused: Vec<HybridSearchResult>,
    ) -> Result<Vec<HybridSearchResult>> {
        if fused.is_empty() {
            return Ok(fused);
        }

        let top_n = stage.options.top_n.unwrap_or(fused.len()).min(fused.len());
        let head = &fused[..top_n];
        let documents: Vec<RerankDocument> = head
            .iter()
            .map(|result| RerankDocument {
                id: result.document.id.clone(),
                content: result.document.content.clone(),
                metadata: result.document.metadata.clone(),
            })
            .collect();

        debug!(
            "handing {} fused results to reranker {} ({})",
            documents.len(),
            stage.reranker.provider_name(),
            stage.reranker.model_name()
        );
        let ranked = stage.reranker.rerank(query, &documents, &stage.options).await?;

        let threshold = stage.options.threshold;
        let reranked = ranked
            .into_iter()
            .filter(|entry| threshold.is_none_or(|threshold| entry.relevance_score >= threshold))
            .filter_map(|entry| {
                head.get(entry.original_index).map(|result| HybridSearchResult {
                    document: result.document.clone(),
                    score: entry.relevance_score,
                    channels: result.channels.clone(),
                })
            })
            .collect();
        Ok(reranked)
    }
}

fn route_channel(
    vector: &QueryVector,
    requested: Option<&str>,
    hybrid: bool,
) -> Option<&'static str> {
    if !hybrid {
        return None;
    }
    // Dual detection: sparse data shape, or a channel name containing
    // "sparse" (some callers address the field without a structured sparse
    // vector)
    let wants_sparse = matches!(vector, QueryVector::Sparse(_))
        || requested.is_some_and(|name| name.contains("sparse"));
    if wants_sparse {
        Some(SPARSE_CHANNEL)
    } else {
        Some(DENSE_CHANNEL)
    }
}
