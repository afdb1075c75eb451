/*!
# Quarry Retrieval

Hybrid retrieval over a vector store: multi-channel search, rank fusion,
and optional second-stage reranking.

## Architecture

```text
Requests (dense / sparse)
  ├─> channel routing (hybrid vs single-vector collections)
  ├─> per-channel VectorStore searches
  └─> RankFusion (RRF / weighted / average)
        └─> Reranker (optional, OpenAI-compatible /rerank)
              └─> Final ranked results
```

## Example

```rust,no_run
use quarry_retrieval::{HybridDispatcher, HybridSearchOptions, HybridSearchRequest, RetrievalConfig};
use quarry_vector_store::{QdrantConfig, QdrantStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), quarry_retrieval::RetrievalError> {
    let store = Arc::new(QdrantStore::new(QdrantConfig::local())?);
    let dispatcher = HybridDispatcher::new(store, RetrievalConfig::default())?;

    let requests = vec![HybridSearchRequest::dense(vec![0.0; 768])];
    let results = dispatcher
        .hybrid_search("code-chunks", &requests, &HybridSearchOptions::default())
        .await?;

    for (rank, result) in results.iter().enumerate() {
        println!("{}. {} (score: {:.3})", rank + 1, result.document.relative_path, result.score);
    }
    Ok(())
}
```

## Fusion strategies

- **rrf** (default): rank-based, robust to differing score scales
- **weighted**: linear combination of raw channel scores
- **average**: mean of raw scores; fallback for unrecognized names
*/

mod config;
mod dispatcher;
mod error;
mod fusion;
mod rerank;
mod result;

pub use config::{FusionParams, FusionSettings, FusionStrategy, RetrievalConfig};
pub use dispatcher::{HybridDispatcher, HybridSearchOptions, HybridSearchRequest, QueryData};
pub use error::{Result, RetrievalError};
pub use fusion::fuse;
pub use rerank::{
    HttpReranker, HttpRerankerConfig, RankedDocument, RerankDocument, RerankOptions, Reranker,
};
pub use result::HybridSearchResult;
