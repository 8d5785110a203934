use serde_json::{Map, Value};
use thiserror::Error;

/// Pre-flight validation errors raised before any request is issued
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Requested window reaches into the future: {0}")]
    WindowInFuture(String),

    #[error("Invalid interval: start {start} is not before end {end}")]
    InvalidInterval { start: i64, end: i64 },

    #[error("Missing location: provide a place name or coordinates")]
    MissingLocation,
}

/// Network-level failure reported by the transport, before any status exists
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Discriminant of [`ApiError`], for callers that only care about the class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    RateLimited,
    UpstreamUnavailable,
    UnclassifiedUpstream,
    Transport,
}

/// Upstream error taxonomy
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("400 - Bad Request: {0}")]
    BadRequest(String),

    #[error("401 - Unauthorized: API token missing or invalid for this API")]
    Unauthorized,

    #[error("404 - Not Found: No data found for the requested parameters {0}")]
    NotFound(String),

    #[error("429 - Too Many Requests: API quota exceeded")]
    RateLimited,

    #[error("{status} - Upstream unavailable")]
    UpstreamUnavailable { status: u16 },

    #[error("{status} - Unclassified upstream response: {detail}")]
    UnclassifiedUpstream { status: u16, detail: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::BadRequest(_) => ApiErrorKind::BadRequest,
            Self::Unauthorized => ApiErrorKind::Unauthorized,
            Self::NotFound(_) => ApiErrorKind::NotFound,
            Self::RateLimited => ApiErrorKind::RateLimited,
            Self::UpstreamUnavailable { .. } => ApiErrorKind::UpstreamUnavailable,
            Self::UnclassifiedUpstream { .. } => ApiErrorKind::UnclassifiedUpstream,
            Self::Transport(_) => ApiErrorKind::Transport,
        }
    }

    /// Status code of the upstream response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::Unauthorized => Some(401),
            Self::NotFound(_) => Some(404),
            Self::RateLimited => Some(429),
            Self::UpstreamUnavailable { status } | Self::UnclassifiedUpstream { status, .. } => {
                Some(*status)
            }
            Self::Transport(_) => None,
        }
    }
}

/// Decode a response body as JSON, substituting an empty object on failure
pub fn parse_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Map a non-success status and its (parsed or empty) body to the taxonomy
pub fn classify(status: u16, body: &Value) -> ApiError {
    match status {
        400 => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Missing or incorrect parameters");
            ApiError::BadRequest(message.to_string())
        }
        401 => ApiError::Unauthorized,
        404 => ApiError::NotFound(body.to_string()),
        429 => ApiError::RateLimited,
        500..=599 => ApiError::UpstreamUnavailable { status },
        _ => ApiError::UnclassifiedUpstream {
            status,
            detail: body.to_string(),
        },
    }
}

/// Errors from the document store and its engines
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Unsupported store URL: {0}")]
    UnsupportedUrl(String),

    #[error("Invalid retention policy: {0}")]
    InvalidPolicy(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
