use thiserror::Error;

/// Raw failure observed while long-polling the review service.
///
/// This is a closed set: the HTTP client maps every error it can produce
/// onto one of these variants before the classifier sees it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollFailure {
    /// The socket read timed out while the server held the request open.
    #[error("read timed out")]
    ReadTimeout,

    /// DNS failure, connection refused, reset, TLS handshake failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The body could not be parsed as a documented response.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("unexpected error: {0}")]
    Other(String),
}

/// Why a response body was rejected.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown status: {0}")]
    UnknownStatus(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("found response carried no attempts")]
    NoAttempts,

    #[error("invalid cursor value: {0}")]
    InvalidCursor(String),
}

impl From<ResponseError> for PollFailure {
    fn from(err: ResponseError) -> Self {
        PollFailure::Malformed(err.to_string())
    }
}

/// Failure to deliver a notification. Never fatal to the polling loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by messaging API: {0}")]
    Rejected(String),
}
