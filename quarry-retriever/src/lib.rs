//! # quarry-retriever
//!
//! Index construction and retrieval-augmented question answering over a
//! local document corpus.
//!
//! ## Features
//!
//! - **Incremental indexing**: walk a corpus in stable order, embed sentence
//!   windows, and checkpoint to SQLite every N files
//! - **Durable storage**: full-snapshot persistence with verified reloads,
//!   so the artifact on disk is always readable
//! - **Retrieve and rerank**: brute-force cosine search over f16 embeddings,
//!   narrowed by a pluggable reranker
//! - **Question answering**: single questions or multi-turn chat with
//!   follow-up condensing, optionally streamed
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use quarry_clients::{ClientConfig, HttpCompletionClient, HttpEmbeddingClient};
//! use quarry_retriever::{BuilderConfig, EngineConfig, IndexBuilder, RetrievalEngine};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let clients = ClientConfig::new("http://localhost:8081");
//! let embedding = Arc::new(HttpEmbeddingClient::new(clients.clone())?);
//!
//! // Build and persist the index.
//! let config = BuilderConfig::new("./corpus", "./index");
//! let mut builder = IndexBuilder::new(config, embedding.clone());
//! let report = builder.run().await?;
//! println!("indexed {} units", report.units_indexed);
//!
//! // Answer a question against it.
//! let completion = Arc::new(HttpCompletionClient::new(clients)?);
//! let engine = RetrievalEngine::open(
//!     "./index".as_ref(),
//!     embedding,
//!     completion,
//!     EngineConfig::new(),
//! )
//! .await?;
//! println!("{}", engine.query("What are the grounding requirements?").await?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`builder`]: corpus walking, embedding, and checkpointed persistence
//! - [`index`]: the in-memory vector index and its SQLite storage
//! - [`engine`]: retrieve-rerank-complete query pipeline and chat layer
//! - [`error`]: the crate-wide error type
//!
//! Model access lives in the `quarry-clients` crate and document extraction
//! in `quarry-ingest`; both are injected, so tests and alternative backends
//! can swap them out.

pub mod builder;
pub mod engine;
pub mod error;
pub mod index;

pub use builder::{BuildReport, BuilderConfig, BuilderState, IndexBuilder};
pub use engine::chat::{ChatEngine, ChatTurn};
pub use engine::rerank::{Reranker, TermOverlapReranker};
pub use engine::{EngineConfig, QueryOutcome, RetrievalEngine, ScoredUnit};
pub use error::{Result, RetrieverError};
pub use index::storage::{IndexStorage, StorageStats};
pub use index::{IndexEntry, VectorIndex, cosine_similarity};
