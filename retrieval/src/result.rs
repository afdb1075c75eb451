use quarry_vector_store::CodeDocument;
use serde::{Deserialize, Serialize};

/// One fused (or reranked) search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridSearchResult {
    /// The stored payload, keyed by its caller-chosen id
    pub document: CodeDocument,

    /// Fused score, or the reranker's relevance score after the rerank
    /// stage
    pub score: f32,

    /// Zero-based indices of the channels that returned this document, in
    /// channel query order
    pub channels: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serializes_with_document_payload() {
        let result = HybridSearchResult {
            document: CodeDocument::new("a", "src/a.rs", 1, 4, "fn a() {}"),
            score: 0.5,
            channels: vec![0, 1],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["document"]["relativePath"], "src/a.rs");
        assert_eq!(json["channels"], serde_json::json!([0, 1]));
    }
}
