//! Error types for the remote model clients

/// Result type for client operations.
///
/// Convenience alias using [`ClientError`] as the error type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for all embedding and completion client operations.
///
/// The two remote services are reached over plain HTTP, so failures fall into
/// two buckets: the request never produced a usable response (`Transport`,
/// `Http`), or it produced a response we could not interpret
/// (`MalformedResponse`). None of these are retried internally; retry policy
/// belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection, DNS, TLS, or timeout failure before a response arrived
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status code
    #[error("HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The response body was not JSON or lacked an expected field
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },
}

impl ClientError {
    /// Create an error for a non-success HTTP status, keeping whatever body
    /// text the service returned alongside it.
    pub fn http<S: Into<String>>(status: reqwest::StatusCode, body: S) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a malformed-response error with a descriptive message.
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}
