use crate::error::{Result, RetrievalError};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options forwarded to the reranker
#[derive(Debug, Clone, Default)]
pub struct RerankOptions {
    /// Ask the provider for at most this many results
    pub top_n: Option<usize>,

    /// Drop results scoring below this relevance
    pub threshold: Option<f32>,
}

/// A document handed to the reranker: id, text, and open metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankDocument {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// A reranked document with the provider's relevance score and its index in
/// the input list
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
    pub document: RerankDocument,
    pub relevance_score: f32,
    pub original_index: usize,
}

/// Second-stage relevance scorer.
///
/// Stateless capability: anything that can order documents by relevance to
/// a query. Results come back in provider-defined ranking order. Provider
/// failures propagate as errors; there is no silent fallback.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        documents: &[RerankDocument],
        options: &RerankOptions,
    ) -> Result<Vec<RankedDocument>>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

/// Settings for an OpenAI-compatible rerank endpoint
#[derive(Debug, Clone)]
pub struct HttpRerankerConfig {
    /// Base URL; `/rerank` is appended
    pub base_url: String,

    /// Bearer token
    pub api_key: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpRerankerConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Reranker backed by an OpenAI-compatible `POST {base_url}/rerank`
/// endpoint with bearer authentication
pub struct HttpReranker {
    http: reqwest::Client,
    config: HttpRerankerConfig,
}

#[derive(Serialize)]
struct RerankRequestBody<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_n: Option<usize>,
    return_documents: bool,
}

#[derive(Deserialize)]
struct RerankResponseBody {
    data: Vec<RerankResponseEntry>,
}

#[derive(Deserialize)]
struct RerankResponseEntry {
    index: usize,
    relevance_score: f32,
}

impl HttpReranker {
    pub fn new(config: HttpRerankerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[RerankDocument],
        options: &RerankOptions,
    ) -> Result<Vec<RankedDocument>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "rerank query must not be empty".to_string(),
            ));
        }
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/rerank", self.config.base_url.trim_end_matches('/'));
        let body = RerankRequestBody {
            model: &self.config.model,
            query,
            documents: documents
                .iter()
                .map(|document| document.content.as_str())
                .collect(),
            top_n: options.top_n,
            return_documents: false,
        };

        debug!("reranking {} documents with {}", documents.len(), self.config.model);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RetrievalError::RerankFailed {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RerankResponseBody = serde_json::from_str(&text).map_err(|err| {
            RetrievalError::RerankFailed {
                status: status.as_u16(),
                body: format!("unparseable rerank response: {err}"),
            }
        })?;

        let ranked = parsed
            .data
            .into_iter()
            .filter(|entry| entry.index < documents.len())
            .map(|entry| RankedDocument {
                document: documents[entry.index].clone(),
                relevance_score: entry.relevance_score,
                original_index: entry.index,
            })
            .collect();
        Ok(ranked)
    }

    fn provider_name(&self) -> &str {
        "openai-compatible"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
