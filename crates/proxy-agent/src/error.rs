use thiserror::Error;

/// Errors a backend adapter can raise. Maps onto spec §7's `backend-http` /
/// `backend-timeout` error kinds; the orchestrator decides recovery policy
/// (fall back to the other adapter once, or surface to the client).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("backend call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("failed to parse backend response: {0}")]
    Parse(String),
}

impl AdapterError {
    /// True for the error kinds spec §7 says are worth a one-shot fallback
    /// to the other adapter (auth failures are config errors and 429s back
    /// off instead — neither of those count as "retryable elsewhere").
    pub fn is_retryable_elsewhere(&self) -> bool {
        match self {
            AdapterError::Api { status, .. } => *status >= 500,
            AdapterError::Timeout { .. } | AdapterError::Http(_) => true,
            AdapterError::Parse(_) => false,
        }
    }

    /// True for the unrecoverable-without-config-change cases spec §7 says
    /// must be surfaced to the caller rather than silently retried.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AdapterError::Api { status, .. } if *status == 401 || *status == 403)
    }

    /// True for HTTP 429 — spec §7 wants a back-off, not a fallback to the
    /// other adapter and not a silent retry.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AdapterError::Api { status, .. } if *status == 429)
    }
}
