//! Error types shared across the crate.
//!
//! Library code returns these typed errors; the binary wraps them in
//! `anyhow` at the edge.

use std::time::Duration;

/// Input rejected before any computation runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A coordinate is outside the valid range or not a finite number.
    #[error("invalid coordinate ({lat}, {lng}): {reason}")]
    InvalidCoordinate { lat: f64, lng: f64, reason: String },

    /// The proximity radius is negative or not finite.
    #[error("invalid radius {0} m: must be a finite, non-negative number")]
    InvalidRadius(f64),

    /// A route was given with no vertices.
    #[error("route has no vertices")]
    EmptyRoute,

    /// A hazard record is missing a required field or carries a bad value.
    #[error("hazard record {id}: {field} {reason}")]
    InvalidRecord {
        id: String,
        field: &'static str,
        reason: String,
    },

    /// A bounding box whose edges do not describe a region.
    #[error("invalid bounding box: {0}")]
    InvalidBounds(String),
}

/// Failure to evaluate a route against a hazard feed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The hazard data source could not be reached and the caller did not
    /// opt into treating that as an empty set.
    #[error("hazard data unavailable: {0}")]
    DataUnavailable(String),
}

/// Failure reported by a transport connector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),

    #[error("transport error: {0}")]
    Io(String),
}

/// Errors surfaced by [`RealtimeChannel`](crate::realtime::RealtimeChannel).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is not connected")]
    NotConnected,

    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("request {request_id} timed out after {timeout:?}")]
    RequestTimeout {
        request_id: String,
        timeout: Duration,
    },

    #[error("channel closed before a response arrived")]
    Disconnected,

    #[error("server rejected request: {0}")]
    Remote(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A frame that could not be turned into a typed message.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame of type '{kind}' has an invalid payload: {reason}")]
    Payload { kind: String, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors from the HTTP hazard data source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("hazard source returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode hazard response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidRecord(#[from] ValidationError),
}
