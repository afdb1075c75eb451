use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A sparse lexical vector: parallel lists of vocabulary indices and
/// strictly positive weights. All other dimensions are implicitly zero.
///
/// The layout matches the wire format hybrid vector stores expect for sparse
/// vectors. Indices are unique but not necessarily sorted; the empty vector
/// is a legal "no match" signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Create a sparse vector from parallel index and value lists.
    ///
    /// # Panics
    /// Panics if the lists have different lengths.
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "indices and values must have the same length"
        );
        Self { indices, values }
    }

    /// Create an empty sparse vector.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of non-zero entries.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True if the vector has no entries.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over `(index, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Dot product with another sparse vector.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        let weights: HashMap<u32, f32> = larger.iter().collect();
        smaller
            .iter()
            .filter_map(|(index, value)| weights.get(&index).map(|w| w * value))
            .sum()
    }
}
