//! Completion client: remote prompt-to-text generation
//!
//! The completion service exposes `POST /llm_complete`, taking
//! `{"text": <prompt>}` and answering `{"text": <completion>, "raw": <opaque>}`.
//! The `raw` payload (token ids or whatever else the server emits) is carried
//! through untouched as [`serde_json::Value`].
//!
//! ## Streaming
//!
//! A streaming request adds `"stream": true` to the body; the service then
//! answers with newline-delimited JSON, one `{"text": <delta>}` object per
//! line, terminated by a line carrying `"done": true` or by end of body.
//!
//! [`HttpCompletionClient::stream_complete`] runs the request on a spawned
//! producer task that feeds deltas into a bounded channel. The returned
//! [`CompletionStream`] pulls from that channel lazily and aborts the producer
//! when dropped, so cancelling the consumer stops the in-flight request
//! promptly instead of draining the generation to completion.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
    raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StreamLine {
    #[serde(default)]
    text: String,
    #[serde(default)]
    done: bool,
}

/// A finished completion.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    /// Generated text
    pub text: String,
    /// Opaque token payload returned by the service, passed through untouched
    pub raw: serde_json::Value,
}

/// One incremental piece of streamed completion text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionDelta {
    pub text: String,
}

/// Lazy, finite, non-restartable sequence of completion deltas.
///
/// Pulled with [`next_delta`](CompletionStream::next_delta) or through the
/// [`futures::Stream`] impl. Dropping the stream aborts the producer task,
/// which drops the underlying HTTP request.
pub struct CompletionStream {
    rx: ReceiverStream<Result<CompletionDelta>>,
    producer: JoinHandle<()>,
}

impl CompletionStream {
    /// Assemble a stream from a delta channel and the task feeding it.
    ///
    /// Alternative [`CompletionClient`] implementations (including test
    /// doubles) use this to hand out their own streams.
    pub fn new(rx: mpsc::Receiver<Result<CompletionDelta>>, producer: JoinHandle<()>) -> Self {
        Self {
            rx: ReceiverStream::new(rx),
            producer,
        }
    }

    /// Pull the next delta, or `None` once the service signalled completion.
    pub async fn next_delta(&mut self) -> Option<Result<CompletionDelta>> {
        self.rx.next().await
    }

    /// Drain the stream, concatenating all delta text.
    ///
    /// Stops at the first error and returns it.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(delta) = self.next_delta().await {
            text.push_str(&delta?.text);
        }
        Ok(text)
    }
}

impl futures::Stream for CompletionStream {
    type Item = Result<CompletionDelta>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::pin::Pin::new(&mut self.get_mut().rx).poll_next(cx)
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

/// Converts a fully formatted prompt into generated text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion and wait for the full result.
    async fn complete(&self, prompt: &str) -> Result<CompletionResult>;

    /// Start a streaming completion; deltas arrive through the returned
    /// stream as the service produces them.
    async fn stream_complete(&self, prompt: &str) -> Result<CompletionStream>;
}

/// HTTP implementation of [`CompletionClient`] against the remote completion
/// service.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpCompletionClient {
    /// Create a client for the service at `config.base_url`.
    ///
    /// The configured request timeout applies to non-streaming completions
    /// only; a streaming response is allowed to run as long as the service
    /// keeps producing deltas.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<CompletionResult> {
        let response = self
            .http
            .post(self.config.completions_url())
            .timeout(self.config.request_timeout)
            .json(&CompletionRequest {
                text: prompt,
                stream: None,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::http(status, body));
        }

        let bytes = response.bytes().await?;
        let parsed: CompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::malformed(format!("completion response: {e}")))?;

        debug!("Completion finished ({} chars)", parsed.text.len());
        Ok(CompletionResult {
            text: parsed.text,
            raw: parsed.raw,
        })
    }

    async fn stream_complete(&self, prompt: &str) -> Result<CompletionStream> {
        let http = self.http.clone();
        let url = self.config.completions_url();
        let prompt = prompt.to_string();
        let (tx, rx) = mpsc::channel(self.config.stream_buffer);

        let producer = tokio::spawn(async move {
            let response = http
                .post(&url)
                .json(&CompletionRequest {
                    text: &prompt,
                    stream: Some(true),
                })
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx.send(Err(ClientError::Transport { source: e })).await;
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let _ = tx.send(Err(ClientError::http(status, body))).await;
                return;
            }

            let mut body = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(ClientError::Transport { source: e })).await;
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);
                for line in drain_lines(&mut buffer) {
                    if !forward_line(&tx, &line).await {
                        return;
                    }
                }
            }
            // Body ended without a trailing newline: flush what remains.
            let tail = String::from_utf8_lossy(&buffer).trim().to_string();
            if !tail.is_empty() {
                forward_line(&tx, &tail).await;
            }
            debug!("Completion stream ended");
        });

        Ok(CompletionStream::new(rx, producer))
    }
}

/// Forward one NDJSON line to the consumer. Returns `false` when the stream
/// is finished (done marker, parse failure, or consumer gone).
async fn forward_line(tx: &mpsc::Sender<Result<CompletionDelta>>, line: &str) -> bool {
    match serde_json::from_str::<StreamLine>(line) {
        Ok(parsed) => {
            if !parsed.text.is_empty() {
                let delta = CompletionDelta { text: parsed.text };
                if tx.send(Ok(delta)).await.is_err() {
                    return false;
                }
            }
            !parsed.done
        }
        Err(e) => {
            let _ = tx
                .send(Err(ClientError::malformed(format!("stream line: {e}"))))
                .await;
            false
        }
    }
}

/// Peel complete lines off the front of `buffer`, leaving any partial line in
/// place for the next chunk. Blank lines are dropped.
fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let tail = buffer.split_off(pos + 1);
        let mut line = std::mem::replace(buffer, tail);
        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }
        let text = String::from_utf8_lossy(&line).trim().to_string();
        if !text.is_empty() {
            lines.push(text);
        }
    }
    lines
}
