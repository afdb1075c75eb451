use thiserror::Error;

/// Errors that can occur during vector store operations
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Caller passed something the backend cannot accept, e.g. a dense
    /// vector whose dimension does not match the collection
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend could not be reached
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered with a non-success status
    #[error("backend rejected request with status {status}: {body}")]
    BackendRejected { status: u16, body: String },

    /// A batched insert failed part-way. Batches before `batch` are
    /// committed and stay committed; nothing from `batch` onward was
    /// written.
    #[error("insert batch {batch} failed: {source}")]
    BatchInsert {
        batch: usize,
        #[source]
        source: Box<VectorStoreError>,
    },

    /// The caller's cancellation signal fired while a request was in flight
    #[error("operation canceled")]
    Canceled,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for VectorStoreError {
    fn from(err: reqwest::Error) -> Self {
        VectorStoreError::BackendUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;
