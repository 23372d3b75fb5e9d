//! Error taxonomy for the verification and dispatch pipeline.

use axum::http::StatusCode;
use thiserror::Error;

/// Why an inbound request was not accepted.
///
/// Nothing here is retried locally; the mapped status code is what drives
/// the remote service's own retry policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// No registered subscription for the callback id in the request path.
    #[error("unknown subscription")]
    UnknownSubscription,

    /// HMAC signature did not match.
    #[error("invalid signature")]
    InvalidSignature,

    /// Timestamp outside the freshness window.
    #[error("stale timestamp")]
    StaleTimestamp,

    /// Verification headers missing or unparseable; indistinguishable from
    /// a forgery, so it maps to the same status as one.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl VerificationError {
    /// The HTTP status returned to the remote service for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownSubscription => StatusCode::NOT_FOUND,
            Self::InvalidSignature | Self::StaleTimestamp | Self::MalformedRequest(_) => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

/// Why a verified notification could not be dispatched.
///
/// These are logged and acknowledged with 200: the request was authentic,
/// so the remote service must not redeliver it.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler registered for this event type and version.
    #[error("no handler for event type {event_type} v{version}")]
    UnsupportedEventType { event_type: String, version: String },

    /// The payload did not decode into the handler's event type.
    #[error("failed to decode event payload: {0}")]
    Decode(String),

    /// The handler itself reported a failure.
    #[error("handler failed: {0}")]
    Handler(String),
}
