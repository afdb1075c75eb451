use quarry_sparse::SparseVector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Payload of an indexed code chunk.
///
/// Identity is by `id`; everything else is payload. The serialized form uses
/// camelCase keys, which is also the payload schema stored in the backend
/// and the field namespace filter expressions match against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDocument {
    /// Stable caller-chosen identifier
    pub id: String,

    /// The chunk text
    pub content: String,

    /// Path of the source file, relative to the indexed root
    pub relative_path: String,

    /// Starting line number (1-indexed)
    pub start_line: u32,

    /// Ending line number (1-indexed, inclusive)
    pub end_line: u32,

    /// File extension including the leading dot, e.g. `.rs`
    pub file_extension: String,

    /// Open metadata mapping
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl CodeDocument {
    /// Create a new document, deriving the file extension from the path
    pub fn new(
        id: impl Into<String>,
        relative_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
    ) -> Self {
        let relative_path = relative_path.into();
        let file_extension = extension_of(&relative_path);
        Self {
            id: id.into(),
            content: content.into(),
            relative_path,
            start_line,
            end_line,
            file_extension,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Number of lines covered by this chunk
    pub fn line_count(&self) -> u32 {
        if self.end_line >= self.start_line {
            self.end_line - self.start_line + 1
        } else {
            0
        }
    }

    /// Look up a payload field by its serialized (camelCase) name.
    ///
    /// Unknown names fall back to the metadata mapping.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "content" => Some(Value::String(self.content.clone())),
            "relativePath" => Some(Value::String(self.relative_path.clone())),
            "startLine" => Some(Value::from(self.start_line)),
            "endLine" => Some(Value::from(self.end_line)),
            "fileExtension" => Some(Value::String(self.file_extension.clone())),
            other => self.metadata.get(other).cloned(),
        }
    }
}

/// Render a payload value in the canonical string form used by scroll
/// results: strings pass through verbatim, everything else as compact JSON.
pub fn canonical_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn extension_of(path: &str) -> String {
    path.rfind('.')
        .filter(|idx| *idx + 1 < path.len())
        .map(|idx| path[idx..].to_string())
        .unwrap_or_default()
}

/// A document ready for insertion: payload plus its vector representations.
///
/// The dense vector must match the collection dimension; the sparse vector
/// is optional and only used by hybrid collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    pub document: CodeDocument,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub sparse_vector: Option<SparseVector>,
}

impl VectorDocument {
    /// Create a dense-only document
    pub fn new(document: CodeDocument, vector: Vec<f32>) -> Self {
        Self {
            document,
            vector,
            sparse_vector: None,
        }
    }

    /// Attach a sparse vector for hybrid collections
    pub fn with_sparse(mut self, sparse: SparseVector) -> Self {
        self.sparse_vector = Some(sparse);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_creation() {
        let document = CodeDocument::new("chunk-1", "src/main.rs", 1, 5, "fn main() {}");
        assert_eq!(document.file_extension, ".rs");
        assert_eq!(document.line_count(), 5);
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(CodeDocument::new("a", "Makefile", 1, 1, "").file_extension, "");
        assert_eq!(
            CodeDocument::new("b", "src/lib.test.ts", 1, 1, "").file_extension,
            ".ts"
        );
        assert_eq!(CodeDocument::new("c", "trailing.", 1, 1, "").file_extension, "");
    }

    #[test]
    fn test_field_lookup() {
        let document = CodeDocument::new("chunk-1", "src/main.rs", 3, 9, "body")
            .with_metadata("language", Value::String("rust".to_string()));

        assert_eq!(
            document.field("relativePath"),
            Some(Value::String("src/main.rs".to_string()))
        );
        assert_eq!(document.field("startLine"), Some(Value::from(3u32)));
        assert_eq!(
            document.field("language"),
            Some(Value::String("rust".to_string()))
        );
        assert_eq!(document.field("missing"), None);
    }

    #[test]
    fn test_canonical_string() {
        assert_eq!(canonical_string(&Value::String("plain".into())), "plain");
        assert_eq!(canonical_string(&Value::from(42u32)), "42");
        assert_eq!(
            canonical_string(&serde_json::json!({"nested": true})),
            "{\"nested\":true}"
        );
    }

    #[test]
    fn test_serialized_keys_are_camel_case() {
        let document = CodeDocument::new("chunk-1", "src/main.rs", 1, 2, "x");
        let json = serde_json::to_value(&document).unwrap();
        assert!(json.get("relativePath").is_some());
        assert!(json.get("fileExtension").is_some());
        assert!(json.get("startLine").is_some());
    }
}
