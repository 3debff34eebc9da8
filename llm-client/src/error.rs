use thiserror::Error;

/// Errors from a text-generation call
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered 2xx but the payload was not what we expect
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Invalid or incomplete configuration (e.g. missing API key)
    #[error("Invalid generation config: {0}")]
    Config(String),

    /// Too many recent failures; calls are short-circuited for a while
    #[error("Service unavailable by circuit breaker, retry in {retry_in_secs}s")]
    CircuitOpen { retry_in_secs: u64 },
}

impl GenerationError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Http(_) | GenerationError::MalformedResponse(_) => true,
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            GenerationError::Config(_) | GenerationError::CircuitOpen { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
