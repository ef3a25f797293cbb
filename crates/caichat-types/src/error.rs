use thiserror::Error;

/// Failures reported by the upstream client handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("session closed")]
    SessionClosed,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed upstream payload: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

/// Failures surfaced by the relay to its callers.
///
/// Streaming replies never carry these; they end with an `EndReason` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Fatal at startup: the process must not serve.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The session manager was used before `open` succeeded.
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("session closed")]
    SessionClosed,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Upstream(String),
}

impl From<UpstreamError> for RelayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Auth(message) => RelayError::Auth(message),
            UpstreamError::SessionClosed => RelayError::SessionClosed,
            UpstreamError::InvalidArgument(message) => RelayError::InvalidArgument(message),
            other => RelayError::Upstream(other.to_string()),
        }
    }
}
