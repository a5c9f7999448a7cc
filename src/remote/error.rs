//! Error type for the gallog HTTP layer.
//!
//! [`RemoteError`] separates the failures callers react to differently:
//! rate limiting and transport failures are retryable, a rejected session is
//! fatal for the run, and everything else is reported with its status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP 429. `retry_after_ms` comes from `Retry-After` when the server sends it.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The server no longer accepts the session cookies.
    #[error("session is no longer authenticated")]
    AuthInvalid,

    /// Non-success status that is not otherwise classified.
    #[error("remote error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// The page came back but did not have the expected shape.
    #[error("unexpected response: {0}")]
    Parse(String),

    /// DNS, connection, TLS or timeout failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl RemoteError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::RateLimited { .. } | RemoteError::Network(_) => true,
            RemoteError::Status { status, .. } => *status >= 500,
            RemoteError::AuthInvalid | RemoteError::Parse(_) => false,
        }
    }
}
