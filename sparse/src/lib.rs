/*!
# Quarry Sparse

Code-aware BM25 sparse encoding for hybrid code search.

This crate turns code chunks into sparse lexical vectors that sit next to
dense semantic vectors in a hybrid collection:

- **Tokenizer**: splits identifiers on case boundaries, underscores and
  hyphens so `getUserId` and `get_user_id` produce the same terms
- **SparseEncoder**: builds a vocabulary over a corpus, weights terms with
  BM25, and emits [`SparseVector`]s for documents and queries
- **VocabularyState**: a round-trip-lossless export of the encoder state so
  an index can be reopened without re-reading the corpus

## Example

```rust
use quarry_sparse::{SparseEncoder, SparseEncoderParams};

let corpus = vec![
    "fn calculate_total_price(items: &[Item]) -> u64".to_string(),
    "fn format_price(price: u64) -> String".to_string(),
];

let mut encoder = SparseEncoder::new(SparseEncoderParams::default());
encoder.build_vocabulary(&corpus);

let query = encoder.embed_query("calculateTotalPrice");
assert!(!query.is_empty());
```
*/

mod encoder;
mod tokenizer;
mod vector;

pub use encoder::{SparseEncoder, SparseEncoderParams, VocabularyState};
pub use tokenizer::{tokenize, TokenMode};
pub use vector::SparseVector;
