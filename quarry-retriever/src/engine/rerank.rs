//! Second-stage ranking of retrieved units.
//!
//! Vector search casts a wide net; the reranker narrows it down by scoring
//! each candidate against the query text itself. [`TermOverlapReranker`] is
//! the built-in lexical implementation. A model-backed reranker can be
//! plugged in through the [`Reranker`] trait without touching the engine.

use std::collections::HashSet;

use crate::engine::ScoredUnit;

/// Re-scores and reorders retrieval candidates for a query.
///
/// Implementations replace each candidate's similarity score with their own
/// relevance score and return at most `top_n` units. A reranker never adds
/// units that were not retrieved.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, candidates: Vec<ScoredUnit>, top_n: usize) -> Vec<ScoredUnit>;
}

/// Lexical reranker scoring candidates by query-term coverage.
///
/// The score is the fraction of distinct query terms that appear in the
/// candidate's window text. Candidates covering the same fraction keep
/// their similarity ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapReranker;

impl Reranker for TermOverlapReranker {
    fn rerank(&self, query: &str, candidates: Vec<ScoredUnit>, top_n: usize) -> Vec<ScoredUnit> {
        let query_terms = term_set(query);

        let mut rescored: Vec<(f32, f32, ScoredUnit)> = candidates
            .into_iter()
            .map(|candidate| {
                let overlap = if query_terms.is_empty() {
                    0.0
                } else {
                    let terms = term_set(&candidate.unit.window_text);
                    let shared = query_terms.intersection(&terms).count();
                    shared as f32 / query_terms.len() as f32
                };
                (overlap, candidate.score, candidate)
            })
            .collect();

        rescored.sort_by(|a, b| {
            (b.0, b.1)
                .partial_cmp(&(a.0, a.1))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rescored.truncate(top_n);

        rescored
            .into_iter()
            .map(|(overlap, _, mut candidate)| {
                candidate.score = overlap;
                candidate
            })
            .collect()
    }
}

/// Distinct lowercase alphanumeric terms in `text`.
fn term_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
