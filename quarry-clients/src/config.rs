//! Configuration for the remote model clients

use std::time::Duration;

/// Connection settings shared by the embedding and completion clients.
///
/// Both services hang off one base URL (`<base>/get_embeddings` and
/// `<base>/llm_complete`), which matches how the upstream services are
/// deployed behind a single tunnel. Construct with [`ClientConfig::new`] and
/// adjust with the `with_*` methods:
///
/// ```
/// use std::time::Duration;
/// use quarry_clients::ClientConfig;
///
/// let config = ClientConfig::new("http://localhost:8080")
///     .with_request_timeout(Duration::from_secs(30));
/// assert_eq!(config.embeddings_url(), "http://localhost:8080/get_embeddings");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the model server, without a trailing path
    pub base_url: String,
    /// Overall per-request timeout (embedding and non-streaming completion)
    pub request_timeout: Duration,
    /// Capacity of the bounded delta channel used by streaming completions
    pub stream_buffer: usize,
}

impl ClientConfig {
    /// Create a configuration for the given base URL with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(120),
            stream_buffer: 32,
        }
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the streaming delta channel capacity.
    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity;
        self
    }

    /// Full URL of the embedding endpoint.
    pub fn embeddings_url(&self) -> String {
        format!("{}/get_embeddings", self.base_url.trim_end_matches('/'))
    }

    /// Full URL of the completion endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/llm_complete", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls_join_cleanly() {
        let config = ClientConfig::new("http://localhost:9999/");
        assert_eq!(
            config.embeddings_url(),
            "http://localhost:9999/get_embeddings"
        );
        assert_eq!(config.completions_url(), "http://localhost:9999/llm_complete");
    }

    #[test]
    fn test_defaults_are_sane() {
        let config = ClientConfig::new("http://h");
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(config.stream_buffer > 0);
    }
}
