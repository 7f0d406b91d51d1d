//! Sentence segmentation
//!
//! Splits extracted document text into sentences for windowing. A sentence
//! ends at a run of terminal punctuation (optionally followed by closing
//! quotes or brackets) and trailing whitespace, or at a blank line. The
//! terminal punctuation stays with its sentence; surrounding whitespace is
//! trimmed and empty pieces are dropped. Abbreviation-aware segmentation is
//! out of scope for this splitter.

use regex::Regex;
use std::sync::OnceLock;

/// Pattern marking the end of a sentence. Matches either terminal punctuation
/// (with optional closing quote/bracket) followed by whitespace, or a blank
/// line.
const SENTENCE_BOUNDARY: &str = r#"[.!?]+["')\]]*\s+|\n\s*\n"#;

fn boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(SENTENCE_BOUNDARY).unwrap())
}

/// Split `text` into trimmed, non-empty sentences in document order.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary_match in boundary().find_iter(text) {
        // Keep the punctuation (everything up to the whitespace) with the
        // sentence; the trim below strips the whitespace part of the match.
        let piece = text[start..boundary_match.end()].trim();
        if !piece.is_empty() {
            sentences.push(piece.to_string());
        }
        start = boundary_match.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}
