//! Huginn error types

use std::time::Duration;

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Raw content errors
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    // Remote asset lifecycle errors
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("asset {asset} still processing after {waited:?}")]
    ProcessingTimeout { asset: String, waited: Duration },

    #[error("asset processing failed: {0}")]
    ProcessingFailed(String),

    // Inference errors
    #[error("malformed structured response: {0}")]
    Decode(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The backend cannot serve this model right now; try the next candidate.
    #[error("model not available")]
    ModelNotAvailable,

    #[error("all models failed after {rounds} round(s); last error: {last}")]
    Exhausted {
        rounds: u32,
        last: Box<HuginnError>,
    },

    // Transport and API errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Run-level errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no items to annotate")]
    NoItems,

    #[error("external calls disabled (offline mode)")]
    Offline,

    #[error("annotation worker panicked: {0}")]
    WorkerPanicked(String),
}

/// How the retry coordinator reacts to a failed inference attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Try the next candidate model immediately.
    AdvanceModel,
    /// Abandon the current round, sleep, then restart from the first model.
    BackoffAndRestart,
    /// No candidate can succeed; stop immediately.
    FailTerminal,
}

impl HuginnError {
    /// Classify this error for the retry coordinator.
    ///
    /// Rate limits and 5xx responses back off; everything else moves on to
    /// the next model, except authentication failures, which no model can
    /// recover from.
    pub fn retry_disposition(&self) -> RetryDisposition {
        match self {
            HuginnError::RateLimited { .. } | HuginnError::Server { .. } => {
                RetryDisposition::BackoffAndRestart
            }
            HuginnError::AuthenticationFailed | HuginnError::Offline => {
                RetryDisposition::FailTerminal
            }
            _ => RetryDisposition::AdvanceModel,
        }
    }

    /// Whether this error means the model itself is missing or unavailable.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self,
            HuginnError::ModelNotFound(_) | HuginnError::ModelNotAvailable
        )
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HuginnError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
