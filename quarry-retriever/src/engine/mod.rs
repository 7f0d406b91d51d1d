//! Query answering over a persisted index.
//!
//! [`RetrievalEngine`] loads a persisted index into memory and answers
//! questions with a retrieve-rerank-complete pipeline: embed the question,
//! take the `similarity_top_k` nearest units, rerank them down to
//! `rerank_top_n`, then ask the completion model with the surviving window
//! texts as context. [`chat::ChatEngine`] layers a conversation on top by
//! condensing follow-up messages into standalone questions.

pub mod chat;
pub mod prompts;
pub mod rerank;

use std::path::Path;
use std::sync::Arc;

use quarry_clients::{CompletionClient, CompletionStream, EmbeddingClient};
use quarry_ingest::IndexableUnit;
use serde::Serialize;

use crate::engine::rerank::{Reranker, TermOverlapReranker};
use crate::error::{Result, RetrieverError};
use crate::index::VectorIndex;
use crate::index::storage::IndexStorage;

/// Retrieval settings for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many units vector search hands to the reranker.
    pub similarity_top_k: usize,
    /// How many units survive reranking and reach the prompt.
    pub rerank_top_n: usize,
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig {
            similarity_top_k: 100,
            rerank_top_n: 5,
        }
    }

    pub fn with_similarity_top_k(mut self, top_k: usize) -> Self {
        self.similarity_top_k = top_k;
        self
    }

    pub fn with_rerank_top_n(mut self, top_n: usize) -> Self {
        self.rerank_top_n = top_n;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A retrieved unit with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredUnit {
    pub unit: IndexableUnit,
    pub score: f32,
}

/// An answer together with the units it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<ScoredUnit>,
}

/// Answers questions against an in-memory copy of the index.
pub struct RetrievalEngine {
    index: VectorIndex,
    embedding: Arc<dyn EmbeddingClient>,
    completion: Arc<dyn CompletionClient>,
    reranker: Box<dyn Reranker>,
    config: EngineConfig,
}

impl RetrievalEngine {
    /// Load the persisted index under `storage_dir` and build an engine on it.
    pub async fn open(
        storage_dir: &Path,
        embedding: Arc<dyn EmbeddingClient>,
        completion: Arc<dyn CompletionClient>,
        config: EngineConfig,
    ) -> Result<Self> {
        let storage = IndexStorage::open_existing(storage_dir).await?;
        let index = storage.load().await?;
        Ok(Self::from_index(index, embedding, completion, config))
    }

    /// Build an engine over an index that is already in memory.
    pub fn from_index(
        index: VectorIndex,
        embedding: Arc<dyn EmbeddingClient>,
        completion: Arc<dyn CompletionClient>,
        config: EngineConfig,
    ) -> Self {
        RetrievalEngine {
            index,
            embedding,
            completion,
            reranker: Box::new(TermOverlapReranker),
            config,
        }
    }

    /// Swap in a different reranker implementation.
    pub fn with_reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub(crate) fn completion(&self) -> &Arc<dyn CompletionClient> {
        &self.completion
    }

    /// Retrieve and rerank the units most relevant to `query`.
    ///
    /// Returns at most `min(similarity_top_k, rerank_top_n)` units, best
    /// first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredUnit>> {
        let embedding = self.embedding.embed(query).await?;
        if embedding.len() != self.index.dimension() {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: embedding.len(),
            });
        }

        let candidates: Vec<ScoredUnit> = self
            .index
            .search(&embedding, self.config.similarity_top_k)
            .into_iter()
            .map(|(unit, score)| ScoredUnit { unit, score })
            .collect();

        Ok(self
            .reranker
            .rerank(query, candidates, self.config.rerank_top_n))
    }

    /// Answer `question` and report which units grounded the answer.
    pub async fn query_with_sources(&self, question: &str) -> Result<QueryOutcome> {
        let sources = self.retrieve(question).await?;
        let prompt = self.build_prompt(question, &sources);
        let completion = self.completion.complete(&prompt).await?;
        Ok(QueryOutcome {
            answer: completion.text,
            sources,
        })
    }

    /// Answer `question`, discarding source attribution.
    pub async fn query(&self, question: &str) -> Result<String> {
        Ok(self.query_with_sources(question).await?.answer)
    }

    /// Answer `question` as a stream of deltas, alongside the sources the
    /// prompt was grounded on. Dropping the stream cancels the completion.
    pub async fn stream_query(
        &self,
        question: &str,
    ) -> Result<(CompletionStream, Vec<ScoredUnit>)> {
        let sources = self.retrieve(question).await?;
        let prompt = self.build_prompt(question, &sources);
        let stream = self.completion.stream_complete(&prompt).await?;
        Ok((stream, sources))
    }

    fn build_prompt(&self, question: &str, sources: &[ScoredUnit]) -> String {
        let contexts: Vec<&str> = sources
            .iter()
            .map(|s| s.unit.window_text.as_str())
            .collect();
        prompts::qa_prompt(question, &contexts)
    }
}
