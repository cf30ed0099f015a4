use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::ResponseError;

/// Resumption token handed out by the review service.
///
/// In practice a Unix timestamp with a fractional part. The server's literal
/// number text is kept and echoed back verbatim; the parsed value is only
/// used for ordering checks and logs.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    raw: String,
    value: f64,
}

impl Cursor {
    /// Wrap a timestamp. Rejects negative and non-finite values.
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value >= 0.0).then(|| Self {
            raw: value.to_string(),
            value,
        })
    }

    /// Keep a server-supplied JSON number exactly as written.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let value: f64 = raw.parse().ok()?;
        (value.is_finite() && value >= 0.0).then(|| Self {
            raw: raw.to_string(),
            value,
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Text to send back as the `timestamp` query parameter.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Where notifications are delivered (a Telegram chat id or `@channel`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finished review of one submitted lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub lesson_title: String,
    pub lesson_url: String,
    pub is_negative: bool,
}

/// Body of a successful long-poll response, as sent on the wire.
///
/// Cursor fields stay raw so their text survives untouched.
#[derive(Debug, Deserialize)]
struct WireResponse {
    status: String,
    #[serde(default)]
    new_attempts: Option<Vec<ReviewEvent>>,
    #[serde(default)]
    last_attempt_timestamp: Option<Box<RawValue>>,
    #[serde(default)]
    timestamp_to_request: Option<Box<RawValue>>,
}

fn cursor_field(
    field: Option<Box<RawValue>>,
    name: &'static str,
) -> Result<Cursor, ResponseError> {
    let raw = field.ok_or(ResponseError::MissingField(name))?;
    Cursor::parse(raw.get()).ok_or_else(|| ResponseError::InvalidCursor(raw.get().to_string()))
}

/// Validated result of one long-poll request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    /// One or more reviews finished since the cursor.
    Found {
        events: Vec<ReviewEvent>,
        next_cursor: Cursor,
    },
    /// The server held the request open and nothing happened.
    Timeout { next_cursor: Cursor },
}

impl PollResponse {
    /// Parse and validate a response body.
    ///
    /// Any shape other than the two documented ones is rejected, as is a
    /// `found` response with no attempts or a negative timestamp.
    pub fn parse(body: &str) -> Result<Self, ResponseError> {
        let wire: WireResponse = serde_json::from_str(body)?;

        match wire.status.as_str() {
            "found" => {
                let events = wire
                    .new_attempts
                    .ok_or(ResponseError::MissingField("new_attempts"))?;
                if events.is_empty() {
                    return Err(ResponseError::NoAttempts);
                }
                let next_cursor =
                    cursor_field(wire.last_attempt_timestamp, "last_attempt_timestamp")?;
                Ok(PollResponse::Found {
                    events,
                    next_cursor,
                })
            }
            "timeout" => {
                let next_cursor =
                    cursor_field(wire.timestamp_to_request, "timestamp_to_request")?;
                Ok(PollResponse::Timeout { next_cursor })
            }
            other => Err(ResponseError::UnknownStatus(other.to_string())),
        }
    }

    pub fn next_cursor(&self) -> &Cursor {
        match self {
            PollResponse::Found { next_cursor, .. } | PollResponse::Timeout { next_cursor } => {
                next_cursor
            }
        }
    }
}

/// A polling failure mapped onto the fixed set of handling actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedError {
    /// Expected, cheap to retry.
    Transient { retry_after: Duration },
    /// Bad credential. Retrying cannot help.
    Unauthorized,
    /// The body did not match the documented format.
    Malformed { retry_after: Duration },
    /// Network, HTTP or otherwise unrecognized failure.
    Unknown { retry_after: Duration },
}

impl ClassifiedError {
    /// Delay before the next attempt, or `None` when the loop must stop.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ClassifiedError::Transient { retry_after }
            | ClassifiedError::Malformed { retry_after }
            | ClassifiedError::Unknown { retry_after } => Some(*retry_after),
            ClassifiedError::Unauthorized => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ClassifiedError::Unauthorized)
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifiedError::Transient { .. } => write!(f, "transient"),
            ClassifiedError::Unauthorized => write!(f, "unauthorized"),
            ClassifiedError::Malformed { .. } => write!(f, "malformed"),
            ClassifiedError::Unknown { .. } => write!(f, "unknown"),
        }
    }
}
