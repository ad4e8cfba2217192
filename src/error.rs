use thiserror::Error;

/// Outcome of an API call: the decoded payload or a classified failure.
pub type CallOutcome<T> = std::result::Result<T, ApiError>;

/// Error type for WEX REST calls (public and trade API)
///
/// The variants mirror how a failure is handled: `Transport` is retried up to
/// the transient budget, `Nonce` is retried with the corrected value up to the
/// nonce budget, everything else is surfaced to the caller immediately.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Exchange error: {0}")]
    Domain(String),

    #[error("Nonce rejected by exchange: {0}")]
    Nonce(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Call cancelled")]
    Cancelled,

    #[error("Call deadline exceeded")]
    DeadlineExceeded,
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Nonce(_))
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport_error",
            ApiError::Domain(_) => "domain_error",
            ApiError::Nonce(_) => "nonce_error",
            ApiError::Decode(_) => "decode_error",
            ApiError::Config(_) => "config_error",
            ApiError::Cancelled => "cancelled",
            ApiError::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Transport("Request timeout".to_string())
        } else if err.is_connect() {
            ApiError::Transport(format!("Failed to connect to exchange: {}", err))
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                429 => ApiError::Transport("Too many requests (HTTP 429)".to_string()),
                500..=599 => ApiError::Transport(format!(
                    "Exchange server error (HTTP {})",
                    status.as_u16()
                )),
                _ => ApiError::Transport(format!("HTTP error: {}", status)),
            }
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(format!("JSON parsing failed: {}", err))
    }
}

/// Push feed errors
#[derive(Error, Debug, Clone)]
pub enum FeedError {
    #[error("Push feed connection error: {0}")]
    Connection(String),

    #[error("Subscription to {0} was not acknowledged in time")]
    SubscribeTimeout(String),

    #[error("Subscription to {channel} rejected: {message}")]
    Rejected { channel: String, message: String },

    #[error("Push feed closed")]
    Closed,

    #[error("Malformed push event: {0}")]
    Decode(String),
}

/// Depth cache errors, reported to the query that triggered them
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Seeding failed for {pair}: {source}")]
    Seeding {
        pair: String,
        #[source]
        source: ApiError,
    },

    #[error("Subscription failed for {pair}: {source}")]
    Subscription {
        pair: String,
        #[source]
        source: FeedError,
    },

    #[error("Depth cache is not running")]
    Stopped,

    #[error("Depth query cancelled")]
    Cancelled,

    #[error("Depth query deadline exceeded")]
    DeadlineExceeded,
}
