//! Embedding client: remote text-to-vector conversion
//!
//! The embedding service exposes one endpoint, `POST /get_embeddings`, taking
//! `{"text": <string>}` and answering `{"embed": [<float>, ...]}`. This module
//! provides the [`EmbeddingClient`] trait (so indexing and retrieval code can
//! be driven by a test double) and [`HttpEmbeddingClient`], the production
//! implementation over that wire contract.
//!
//! Vectors cross the wire as `f32` and are converted to `f16` here, once, so
//! every downstream consumer (index, storage, similarity search) works with a
//! single representation.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use half::f16;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embed: Vec<f32>,
}

/// Converts a text string into a fixed-dimension vector.
///
/// Implementations block (await) until the vector is available. No retry is
/// attempted on failure; retry policy belongs to the caller.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f16>>;
}

/// HTTP implementation of [`EmbeddingClient`] against the remote embedding
/// service.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpEmbeddingClient {
    /// Create a client for the service at `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f16>> {
        let response = self
            .http
            .post(self.config.embeddings_url())
            .json(&EmbeddingRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::http(status, body));
        }

        let bytes = response.bytes().await?;
        let parsed: EmbeddingResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::malformed(format!("embedding response: {e}")))?;

        debug!("Embedded text into {} dimensions", parsed.embed.len());
        Ok(parsed.embed.into_iter().map(f16::from_f32).collect())
    }
}
