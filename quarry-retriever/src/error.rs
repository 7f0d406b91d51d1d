//! Error types for index construction and retrieval.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while building, persisting, or querying the vector index.
#[derive(Error, Debug)]
pub enum RetrieverError {
    /// Writing a snapshot of the index to durable storage failed.
    ///
    /// Persistence failures are fatal to an indexing run: the on-disk
    /// artifact can no longer be trusted to match what was built.
    #[error("failed to persist index: {source}")]
    Persist {
        #[source]
        source: sqlx::Error,
    },

    /// Reading a persisted index back from storage failed.
    #[error("failed to reload index: {message}")]
    Reload { message: String },

    /// A storage operation outside the persist/reload cycle failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// An embedding did not match the dimension the index was created with.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The corpus root does not exist or is not a directory.
    #[error("corpus root is not a directory: {path}")]
    CorpusRootMissing { path: PathBuf },

    /// A model-server call failed.
    #[error(transparent)]
    Client(#[from] quarry_clients::ClientError),

    /// Reading or windowing a source document failed.
    #[error(transparent)]
    Ingest(#[from] quarry_ingest::IngestError),

    /// Filesystem access outside of document extraction failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrieverError {
    /// Wrap a database error from the persist path.
    pub fn persist(source: sqlx::Error) -> Self {
        RetrieverError::Persist { source }
    }

    /// Build a reload error with a human-readable cause.
    pub fn reload(message: impl Into<String>) -> Self {
        RetrieverError::Reload {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RetrieverError>;
