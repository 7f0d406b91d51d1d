//! Error types for document ingestion

use std::path::PathBuf;

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Per-file ingestion failure.
///
/// Both variants carry the offending path so the caller can report and skip
/// the file; ingestion errors never describe anything beyond one file.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The file's extension is not on the configured allow-list
    #[error("unsupported format \"{extension}\": {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file matched the allow-list but its text could not be extracted
    #[error("extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },
}

impl IngestError {
    /// Create an unsupported-format error for the given file.
    pub fn unsupported(path: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            extension: extension.into(),
        }
    }

    /// Create an extraction error with a descriptive message.
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }
}
