//! Error types for the engine.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a backlog run.
#[derive(Debug, Error)]
pub enum Error {
    /// Transient network or service failure; retrying may succeed.
    #[error("Transient error: {0}")]
    Transient(String),

    /// The remote service asked us to slow down.
    #[error("Rate limited")]
    RateLimited {
        /// Server-suggested wait before retrying, if provided.
        retry_after: Option<Duration>,
    },

    /// Authentication or authorization failure. Run-fatal.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A response that could not be understood.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A rule file could not be loaded.
    #[error("Rule store error: {0}")]
    RuleStore(String),

    /// A provider filter could not be applied.
    #[error("Filter application error: {0}")]
    FilterApplication(String),

    /// Inference endpoint failure.
    #[error("Inference error: {0}")]
    Inference(#[from] mailsieve_infer::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the shared retry policy should retry this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) | Self::RateLimited { .. } => true,
            Self::Inference(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether this error should use the longer rate-limit backoff curve.
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Inference(mailsieve_infer::Error::RateLimited { .. })
        )
    }

    /// Server-suggested backoff, when the service provided one.
    #[must_use]
    pub const fn suggested_backoff(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after: Some(d),
            } => Some(*d),
            Self::Inference(mailsieve_infer::Error::RateLimited {
                retry_after_secs: Some(s),
            }) => Some(Duration::from_secs(*s)),
            _ => None,
        }
    }

    /// Whether the error must end the whole run.
    ///
    /// Only authentication failures are fatal by kind; everything else
    /// is isolated per message, filter, or page.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::Inference(mailsieve_infer::Error::Unauthorized)
        )
    }
}
