//! Raw faults raised by the network collaborators, and the error type that
//! flows out of the run loop.
//!
//! Faults are kept as data rather than strings so that [`crate::taxonomy`]
//! can classify them with a plain `match`.  Each client converts its own
//! failures into one of the [`Fault`] families at the boundary.

use thiserror::Error;

/// Low-level transport failure reported by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFault {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("connect timeout: {0}")]
    ConnectTimeout(String),
    #[error("read timeout: {0}")]
    ReadTimeout(String),
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportFault {
    /// Whether this is one of the network faults the taxonomy knows about.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, TransportFault::Other(_))
    }
}

impl From<&reqwest::Error> for TransportFault {
    fn from(err: &reqwest::Error) -> Self {
        let text = err.to_string();
        if err.is_timeout() {
            if err.is_connect() {
                TransportFault::ConnectTimeout(text)
            } else {
                TransportFault::ReadTimeout(text)
            }
        } else if err.is_connect() || err.is_request() {
            // `is_request` covers a connection reset or closed mid-exchange.
            TransportFault::Connection(text)
        } else if err.is_body() && err.status().is_none() {
            TransportFault::Connection(text)
        } else {
            TransportFault::Other(text)
        }
    }
}

/// Failures raised by the source (Reddit) client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceFault {
    #[error("received invalid JSON from Reddit")]
    BadJson,
    /// The source client's wrapper around a lower-level network fault.
    #[error("request failed: {0}")]
    Request(TransportFault),
    #[error("Reddit server error (HTTP {0})")]
    ServerError(u16),
    #[error("Reddit rate limit exceeded")]
    TooManyRequests,
    #[error("unexpected Reddit response (HTTP {0})")]
    Response(u16),
    #[error("Reddit OAuth error: {0}")]
    OAuth(String),
    /// An API call was refused even with a freshly granted token.
    #[error("Reddit rejected the access token")]
    TokenRejected,
    #[error("Reddit redirected the request")]
    Redirect,
    #[error("Reddit refused access (HTTP 403)")]
    Forbidden,
    #[error("Reddit resource not found (HTTP 404)")]
    NotFound,
}

/// Failures raised by the destination (Bluesky) client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationFault {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    InvokeTimeout,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("HTTP {0}: {1}")]
    Status(u16, String),
    #[error("unexpected response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for DestinationFault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DestinationFault::InvokeTimeout
        } else if err.is_connect() || err.is_request() {
            DestinationFault::Network(err.to_string())
        } else if err.is_decode() {
            DestinationFault::BadResponse(err.to_string())
        } else {
            DestinationFault::Network(err.to_string())
        }
    }
}

/// Any fault a wrapped network call (or the image collaborator) can raise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error(transparent)]
    Transport(#[from] TransportFault),
    #[error(transparent)]
    Source(#[from] SourceFault),
    #[error(transparent)]
    Destination(#[from] DestinationFault),
    #[error("image processing failed: {0}")]
    Image(String),
}

impl From<reqwest::Error> for Fault {
    fn from(err: reqwest::Error) -> Self {
        Fault::Transport(TransportFault::from(&err))
    }
}

/// Everything that can end a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Operator interrupt; never classified as a fault.
    #[error("stopped by user")]
    Cancelled,
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl From<SourceFault> for RunError {
    fn from(fault: SourceFault) -> Self {
        RunError::Fault(fault.into())
    }
}

impl From<DestinationFault> for RunError {
    fn from(fault: DestinationFault) -> Self {
        RunError::Fault(fault.into())
    }
}
