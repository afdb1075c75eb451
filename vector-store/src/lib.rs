/*!
# Quarry Vector Store

Backend-neutral vector storage for hybrid code search.

The [`VectorStore`] trait is the port the retrieval layer talks to; this
crate ships two implementations:

- [`QdrantStore`]: the primary backend, speaking the Qdrant REST API with
  named `dense`/`sparse` vectors for hybrid collections
- [`MemoryStore`]: an exact-scoring in-memory backend with optional JSON
  persistence, for local development and tests

Caller-chosen string ids are mapped to backend point ids with the
deterministic [`point_id`] function; the original id always travels in the
payload and is what callers get back.

## Example

```rust,no_run
use quarry_vector_store::{QdrantConfig, QdrantStore, VectorStore};

#[tokio::main]
async fn main() -> Result<(), quarry_vector_store::VectorStoreError> {
    let store = QdrantStore::new(QdrantConfig::local())?;

    if !store.has_collection("code-chunks").await? {
        store.create_hybrid_collection("code-chunks", 768).await?;
    }

    Ok(())
}
```
*/

mod document;
mod error;
mod filter;
mod memory;
mod qdrant;
mod store;

pub use document::{canonical_string, CodeDocument, VectorDocument};
pub use error::{Result, VectorStoreError};
pub use filter::{parse_filter, FieldCondition, Filter};
pub use memory::MemoryStore;
pub use qdrant::{QdrantConfig, QdrantStore, INSERT_BATCH_SIZE};
pub use store::{
    point_id, QueryVector, ScoredPoint, SearchOptions, VectorStore, DEFAULT_SEARCH_LIMIT,
    DENSE_CHANNEL, SPARSE_CHANNEL,
};
