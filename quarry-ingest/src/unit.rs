//! The indexable unit produced by ingestion

use serde::{Deserialize, Serialize};

/// One sentence of source text plus its surrounding context window.
///
/// Units are what the index stores and what retrieval returns. `core_text` is
/// the sentence itself and is what gets embedded, keeping the match
/// granularity tight; `window_text` is the sentence plus its neighbors and is
/// what ends up in a prompt, so an answer sees more context than the matched
/// sentence alone. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexableUnit {
    /// The sentence this unit is centered on
    pub core_text: String,
    /// The sentence plus up to `window_size` neighbors on each side
    pub window_text: String,
    /// Path of the source file this unit came from
    pub source_path: String,
    /// 0-indexed position of the sentence within its source file
    pub sequence: usize,
}
