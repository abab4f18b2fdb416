//! Error types for inference endpoint operations.

/// Result type alias for inference operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the inference client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport error (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server rejected the request with 429.
    #[error("Rate limited by inference server")]
    RateLimited {
        /// Server-suggested wait before retrying, if provided.
        retry_after_secs: Option<u64>,
    },

    /// The server answered with a non-success status.
    #[error("Inference server error: HTTP {status}")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// Authentication with the inference server failed.
    #[error("Inference server rejected credentials")]
    Unauthorized,

    /// The response body did not have the expected shape.
    #[error("Invalid inference response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Whether retrying the same request may succeed.
    ///
    /// Connection failures, timeouts and 5xx responses are transient;
    /// rate limits are retryable too but carry their own backoff curve.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Server { status } => *status >= 500,
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Whether this is a rate-limit rejection.
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_transient_only_above_500() {
        assert!(Error::Server { status: 500 }.is_transient());
        assert!(Error::Server { status: 503 }.is_transient());
        assert!(!Error::Server { status: 404 }.is_transient());
        assert!(!Error::Unauthorized.is_transient());
    }

    #[test]
    fn test_rate_limit_classification() {
        let err = Error::RateLimited {
            retry_after_secs: Some(30),
        };
        assert!(err.is_rate_limit());
        assert!(err.is_transient());
        assert!(!Error::Server { status: 500 }.is_rate_limit());
    }
}
