use crate::tokenizer::{tokenize, TokenMode};
use crate::vector::SparseVector;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// BM25 parameters for the sparse encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseEncoderParams {
    /// Term-frequency saturation
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Document-length normalization strength (0.0 - 1.0)
    #[serde(default = "default_b")]
    pub b: f32,

    /// Drop terms appearing in fewer than this many documents
    #[serde(default = "default_min_df")]
    pub min_df: u32,

    /// Drop terms appearing in more than this fraction of documents
    #[serde(default = "default_max_df_ratio")]
    pub max_df_ratio: f32,

    /// Use `1 + ln(tf)` instead of raw term frequency
    #[serde(default)]
    pub sublinear_tf: bool,

    /// Tokenizer selection
    #[serde(default)]
    pub token_mode: TokenMode,
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

fn default_min_df() -> u32 {
    1
}

fn default_max_df_ratio() -> f32 {
    0.85
}

impl Default for SparseEncoderParams {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            min_df: default_min_df(),
            max_df_ratio: default_max_df_ratio(),
            sublinear_tf: false,
            token_mode: TokenMode::default(),
        }
    }
}

impl SparseEncoderParams {
    /// Validate parameter ranges
    pub fn validate(&self) -> Result<(), String> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(format!("k1 must be a non-negative number, got {}", self.k1));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(format!("b must be in [0.0, 1.0], got {}", self.b));
        }
        if !(self.max_df_ratio > 0.0 && self.max_df_ratio <= 1.0) {
            return Err(format!(
                "max_df_ratio must be in (0.0, 1.0], got {}",
                self.max_df_ratio
            ));
        }
        Ok(())
    }
}

/// Persistable encoder state. Round-trips exactly through
/// [`SparseEncoder::export_state`] / [`SparseEncoder::import_state`], and the
/// serialized form is language-neutral (paired arrays plus scalars).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyState {
    pub vocabulary: Vec<(String, u32)>,
    pub document_frequency: Vec<(String, u32)>,
    pub idf_cache: Vec<(String, f32)>,
    pub total_documents: u64,
    pub avg_document_length: f32,
    pub config: SparseEncoderParams,
}

/// BM25 sparse encoder over a code corpus.
///
/// Owns the vocabulary, document-frequency table, and cached IDF weights.
/// [`build_vocabulary`](Self::build_vocabulary) or
/// [`import_state`](Self::import_state) initialize the encoder;
/// [`clear`](Self::clear) resets it. Embedding never fails: unknown terms
/// are skipped and an empty input produces an empty sparse vector.
///
/// Embedding on an uninitialized encoder auto-initializes from that single
/// input and logs a warning. This degraded mode keeps one-off callers
/// working but produces near-useless IDF weights; build over the real
/// corpus instead.
pub struct SparseEncoder {
    params: SparseEncoderParams,
    vocabulary: HashMap<String, u32>,
    document_frequency: HashMap<String, u32>,
    idf_cache: HashMap<String, f32>,
    total_documents: u64,
    avg_document_length: f32,
    initialized: bool,
}

impl Default for SparseEncoder {
    fn default() -> Self {
        Self::new(SparseEncoderParams::default())
    }
}

impl SparseEncoder {
    /// Create an uninitialized encoder with the given parameters
    pub fn new(params: SparseEncoderParams) -> Self {
        Self {
            params,
            vocabulary: HashMap::new(),
            document_frequency: HashMap::new(),
            idf_cache: HashMap::new(),
            total_documents: 0,
            avg_document_length: 0.0,
            initialized: false,
        }
    }

    /// Current parameters
    pub fn params(&self) -> &SparseEncoderParams {
        &self.params
    }

    /// Replace the parameters.
    ///
    /// Allowed at any time, but while initialized the cached IDF weights no
    /// longer match the new parameters until the next
    /// [`build_vocabulary`](Self::build_vocabulary); a warning is logged.
    /// The rebuild is never implicit (its cost is corpus-proportional).
    pub fn set_params(&mut self, params: SparseEncoderParams) {
        if self.initialized {
            warn!(
                "sparse encoder parameters changed while initialized; \
                 cached IDF weights are stale until build_vocabulary is called again"
            );
        }
        self.params = params;
    }

    /// True once a vocabulary has been built or imported
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of terms in the vocabulary
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Build the vocabulary, document-frequency table, and IDF cache from a
    /// corpus in a single pass.
    ///
    /// Terms outside `[min_df, ceil(max_df_ratio * N)]` are dropped. An
    /// empty corpus is legal and yields an empty vocabulary. The new state
    /// replaces the old atomically: no partially built tables are ever
    /// observable.
    pub fn build_vocabulary<S: AsRef<str>>(&mut self, documents: &[S]) {
        let mut ordered_terms: Vec<String> = Vec::new();
        let mut document_frequency: HashMap<String, u32> = HashMap::new();
        let mut total_tokens = 0usize;

        for document in documents {
            let tokens = tokenize(document.as_ref(), self.params.token_mode);
            total_tokens += tokens.len();

            let unique: HashSet<&String> = tokens.iter().collect();
            for term in unique {
                match document_frequency.get_mut(term.as_str()) {
                    Some(df) => *df += 1,
                    None => {
                        document_frequency.insert(term.clone(), 1);
                        ordered_terms.push(term.clone());
                    }
                }
            }
        }

        let total_documents = documents.len() as u64;
        let avg_document_length = if documents.is_empty() {
            0.0
        } else {
            total_tokens as f32 / documents.len() as f32
        };
        // Ceiling keeps boundary terms: on a tiny corpus a term present in
        // every document must survive the ratio cut (see the seed corpus
        // tests below).
        let max_df = (self.params.max_df_ratio * total_documents as f32).ceil() as u32;

        let mut vocabulary = HashMap::new();
        let mut kept_frequency = HashMap::new();
        let mut idf_cache = HashMap::new();
        let n = total_documents as f32;
        let mut next_index = 0u32;

        for term in ordered_terms {
            let df = document_frequency[&term];
            if df < self.params.min_df || df > max_df {
                continue;
            }
            // BM25+ IDF: the +1 keeps the weight non-negative even for
            // terms appearing in most documents.
            let idf = ((n - df as f32 + 0.5) / (df as f32 + 0.5) + 1.0).ln();
            vocabulary.insert(term.clone(), next_index);
            kept_frequency.insert(term.clone(), df);
            idf_cache.insert(term, idf);
            next_index += 1;
        }

        debug!(
            "built vocabulary: {} terms from {} documents (avg length {:.1})",
            vocabulary.len(),
            total_documents,
            avg_document_length
        );

        self.vocabulary = vocabulary;
        self.document_frequency = kept_frequency;
        self.idf_cache = idf_cache;
        self.total_documents = total_documents;
        self.avg_document_length = avg_document_length;
        self.initialized = true;
    }

    /// Embed a document as a sparse BM25 vector
    pub fn embed_document(&mut self, text: &str) -> SparseVector {
        self.ensure_initialized(text);
        self.embed(text)
    }

    /// Embed a query as a sparse BM25 vector.
    ///
    /// Queries and documents share one formula; keep them single-sourced.
    pub fn embed_query(&mut self, text: &str) -> SparseVector {
        self.ensure_initialized(text);
        self.embed(text)
    }

    fn ensure_initialized(&mut self, text: &str) {
        if !self.initialized {
            warn!("sparse encoder not initialized; building vocabulary from a single document");
            self.build_vocabulary(&[text]);
        }
    }

    fn embed(&self, text: &str) -> SparseVector {
        let tokens = tokenize(text, self.params.token_mode);
        let doc_len = tokens.len();
        if doc_len == 0 {
            return SparseVector::empty();
        }

        // Term frequencies restricted to the vocabulary, in order of first
        // appearance so the output is stable for a given input.
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for token in &tokens {
            if !self.vocabulary.contains_key(token.as_str()) {
                continue;
            }
            let count = counts.entry(token.as_str()).or_insert(0);
            if *count == 0 {
                order.push(token.as_str());
            }
            *count += 1;
        }

        let k1 = self.params.k1;
        let b = self.params.b;
        let length_norm = 1.0 - b + b * doc_len as f32 / self.avg_document_length.max(1.0);

        let mut indices = Vec::with_capacity(order.len());
        let mut values = Vec::with_capacity(order.len());
        for term in order {
            let tf = counts[term] as f32;
            let adjusted_tf = if self.params.sublinear_tf {
                1.0 + tf.ln()
            } else {
                tf
            };
            let idf = self.idf_cache.get(term).copied().unwrap_or(0.0);
            let score = idf * adjusted_tf * (k1 + 1.0) / (adjusted_tf + k1 * length_norm);
            if score > 0.0 {
                indices.push(self.vocabulary[term]);
                values.push(score);
            }
        }

        SparseVector::new(indices, values)
    }

    /// Export the full encoder state as a serializable container
    pub fn export_state(&self) -> VocabularyState {
        let mut vocabulary: Vec<(String, u32)> = self
            .vocabulary
            .iter()
            .map(|(term, index)| (term.clone(), *index))
            .collect();
        vocabulary.sort_by_key(|(_, index)| *index);

        let mut document_frequency: Vec<(String, u32)> = self
            .document_frequency
            .iter()
            .map(|(term, df)| (term.clone(), *df))
            .collect();
        document_frequency.sort_by(|a, b| a.0.cmp(&b.0));

        let mut idf_cache: Vec<(String, f32)> = self
            .idf_cache
            .iter()
            .map(|(term, idf)| (term.clone(), *idf))
            .collect();
        idf_cache.sort_by(|a, b| a.0.cmp(&b.0));

        VocabularyState {
            vocabulary,
            document_frequency,
            idf_cache,
            total_documents: self.total_documents,
            avg_document_length: self.avg_document_length,
            config: self.params.clone(),
        }
    }

    /// Restore the encoder from an exported state and mark it initialized.
    ///
    /// The replacement is atomic; a subsequent embed of the same input
    /// produces the same sparse vector as before the export.
    pub fn import_state(&mut self, state: VocabularyState) {
        self.vocabulary = state.vocabulary.into_iter().collect();
        self.document_frequency = state.document_frequency.into_iter().collect();
        self.idf_cache = state.idf_cache.into_iter().collect();
        self.total_documents = state.total_documents;
        self.avg_document_length = state.avg_document_length;
        self.params = state.config;
        self.initialized = true;
    }

    /// Reset to the uninitialized state, dropping all tables
    pub fn clear(&mut self) {
        self.vocabulary.clear();
        self.document_frequency.clear();
        self.idf_cache.clear();
        self.total_documents = 0;
        self.avg_document_length = 0.0;
        self.initialized = false;
    }
}
