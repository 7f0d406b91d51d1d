//! In-memory vector index over windowed document units.
//!
//! The index holds every embedded unit in memory and scores queries with
//! brute-force cosine similarity. Persistence is handled separately by
//! [`storage::IndexStorage`], which snapshots the whole index into SQLite.

pub mod storage;

use half::f16;
use quarry_ingest::IndexableUnit;

use crate::error::{Result, RetrieverError};

/// One indexed unit together with the embedding of its core sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub unit: IndexableUnit,
    pub embedding: Vec<f16>,
}

/// A fixed-dimension, in-memory similarity index.
///
/// All embeddings stored here have the same length, checked on insertion.
/// Search is linear scan with cosine similarity, which is plenty for the
/// corpus sizes a single model server can embed in reasonable time.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index that accepts embeddings of `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        VectorIndex {
            dimension,
            entries: Vec::new(),
        }
    }

    /// Rebuild an index from entries loaded out of storage.
    ///
    /// The caller is responsible for having validated entry dimensions.
    pub fn from_entries(dimension: usize, entries: Vec<IndexEntry>) -> Self {
        VectorIndex { dimension, entries }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Insert a batch of entries, validating every embedding first.
    ///
    /// If any embedding has the wrong dimension the whole batch is rejected
    /// and the index is left exactly as it was.
    pub fn insert_batch(&mut self, batch: Vec<IndexEntry>) -> Result<()> {
        for entry in &batch {
            if entry.embedding.len() != self.dimension {
                return Err(RetrieverError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.embedding.len(),
                });
            }
        }
        self.entries.extend(batch);
        Ok(())
    }

    /// Return up to `limit` units most similar to `query`, best first.
    pub fn search(&self, query: &[f16], limit: usize) -> Vec<(IndexableUnit, f32)> {
        let mut scored: Vec<(IndexableUnit, f32)> = self
            .entries
            .iter()
            .map(|entry| {
                let score = cosine_similarity(query, &entry.embedding);
                (entry.unit.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

/// Cosine similarity between two f16 embedding vectors.
pub fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f32::from(*x) * f32::from(*y))
        .sum();

    let norm_a: f32 = a.iter().map(|x| f32::from(*x).powi(2)).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| f32::from(*x).powi(2)).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
