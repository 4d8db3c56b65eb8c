use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid chunking, retrieval or index parameters. The caller must fix
    /// them before retrying.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Corpus is empty: {0}")]
    EmptyCorpus(String),

    /// The embedding provider failed. Fatal to the current retrieval only.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// A search was issued against an index that holds no vectors.
    #[error("Search index not built: {0}")]
    IndexNotBuilt(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The persisted index artifacts are missing, inconsistent or unreadable.
    #[error("Persisted index invalid: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps a provider failure, keeping the full cause chain in the message.
    pub fn embedding(err: anyhow::Error) -> Self {
        Self::Embedding(format!("{err:#}"))
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
