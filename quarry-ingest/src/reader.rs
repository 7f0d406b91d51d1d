//! Document reading and sentence windowing
//!
//! [`DocumentReader`] turns one source file into an ordered sequence of
//! [`IndexableUnit`]s: check the extension against the allow-list, extract
//! the text (PDF through `pdf-extract`, anything else on the allow-list as
//! UTF-8 plain text), split into sentences, and wrap each sentence in a
//! window of its neighbors. The reader performs no embedding and no indexing.
//!
//! Window assembly: for sentence `i` of `n` with window size `w`, the window
//! spans sentences `max(0, i-w) ..= min(n-1, i+w)` joined by single spaces,
//! so windows clip at document boundaries instead of padding.

use crate::error::{IngestError, Result};
use crate::sentences::split_sentences;
use crate::unit::IndexableUnit;
use std::path::Path;
use tracing::debug;

/// Configuration for document ingestion.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Number of neighboring sentences included on each side of a window
    pub window_size: usize,
    /// File extensions (lowercase, without dot) eligible for ingestion
    pub allowed_extensions: Vec<String>,
}

impl IngestConfig {
    /// Create the default configuration: window size 3, PDF files only.
    pub fn new() -> Self {
        Self {
            window_size: 3,
            allowed_extensions: vec!["pdf".to_string()],
        }
    }

    /// Set the window size (0 means the window is just the sentence itself).
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Replace the extension allow-list. Extensions are matched without the
    /// dot, case-insensitively.
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.into().to_ascii_lowercase())
            .collect();
        self
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads source files and produces sentence-window units.
#[derive(Debug, Clone)]
pub struct DocumentReader {
    config: IngestConfig,
}

impl DocumentReader {
    /// Create a reader with the given configuration.
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// The configuration this reader was built with.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest one file into an ordered sequence of units.
    ///
    /// Fails with [`IngestError::UnsupportedFormat`] when the extension is
    /// not on the allow-list and [`IngestError::Extraction`] when the file
    /// yields no extractable text.
    pub fn ingest(&self, path: &Path) -> Result<Vec<IndexableUnit>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if !self
            .config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed == &extension)
        {
            return Err(IngestError::unsupported(path, extension));
        }

        let text = extract_text(path, &extension)?;
        let sentences = split_sentences(&text);
        if sentences.is_empty() {
            return Err(IngestError::extraction(path, "no extractable text"));
        }

        debug!(
            "Split {} into {} sentences",
            path.display(),
            sentences.len()
        );
        Ok(self.windows(path, &sentences))
    }

    fn windows(&self, path: &Path, sentences: &[String]) -> Vec<IndexableUnit> {
        let w = self.config.window_size;
        let source_path = path.display().to_string();
        sentences
            .iter()
            .enumerate()
            .map(|(i, core)| {
                let lo = i.saturating_sub(w);
                let hi = usize::min(sentences.len() - 1, i + w);
                IndexableUnit {
                    core_text: core.clone(),
                    window_text: sentences[lo..=hi].join(" "),
                    source_path: source_path.clone(),
                    sequence: i,
                }
            })
            .collect()
    }
}

/// Extract the full text of `path`. PDF goes through `pdf-extract`; any other
/// allow-listed extension is read as UTF-8 plain text.
fn extract_text(path: &Path, extension: &str) -> Result<String> {
    match extension {
        "pdf" => pdf_extract::extract_text(path)
            .map_err(|e| IngestError::extraction(path, e.to_string())),
        _ => std::fs::read_to_string(path)
            .map_err(|e| IngestError::extraction(path, e.to_string())),
    }
}
