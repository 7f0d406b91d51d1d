//! # quarry-clients
//!
//! HTTP clients for the two remote model services the quarry pipeline relies
//! on: an embedding service (`POST /get_embeddings`) and a completion service
//! (`POST /llm_complete`), both hanging off one configured base URL.
//!
//! ## Features
//!
//! - **Trait seams**: [`EmbeddingClient`] and [`CompletionClient`] are small
//!   `#[async_trait]` traits, so indexing and retrieval code takes injected
//!   clients and tests run on doubles with no network
//! - **Half-precision vectors**: embeddings convert from wire `f32` to `f16`
//!   at the client boundary and stay `f16` everywhere downstream
//! - **Cancellable streaming**: streamed completions run a producer task
//!   feeding a bounded channel; dropping the consumer aborts the request
//! - **No hidden retries**: transport failures surface immediately and retry
//!   policy stays with the caller
//!
//! ## Quick Start
//!
//! ```no_run
//! use quarry_clients::{ClientConfig, EmbeddingClient, HttpEmbeddingClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::new("http://localhost:8081");
//! let client = HttpEmbeddingClient::new(config)?;
//! let vector = client.embed("What is grounding resistance?").await?;
//! println!("dimension: {}", vector.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: shared connection settings and endpoint URLs
//! - [`embedding`]: the embedding trait and its HTTP implementation
//! - [`completion`]: the completion trait, streaming machinery, HTTP impl
//! - [`error`]: [`ClientError`] and the crate [`Result`] alias

pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;

pub use completion::{
    CompletionClient, CompletionDelta, CompletionResult, CompletionStream, HttpCompletionClient,
};
pub use config::ClientConfig;
pub use embedding::{EmbeddingClient, HttpEmbeddingClient};
pub use error::{ClientError, Result};
