use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("vector store error: {0}")]
    VectorStore(#[from] quarry_vector_store::VectorStoreError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("rerank backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("rerank request rejected with status {status}: {body}")]
    RerankFailed { status: u16, body: String },
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        RetrievalError::BackendUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
