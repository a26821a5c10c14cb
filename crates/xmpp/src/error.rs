use thiserror::Error;

/// Why a connection attempt did not produce a live session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// A required argument was missing or empty. Raised before any
    /// transport session exists.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The transport reported a disconnect or connection failure. Carries
    /// the transport's condition string verbatim.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server rejected the credential.
    #[error("authentication failed: {0}")]
    Authentication(String),
}

impl ConnectError {
    /// Only transport failures are worth retrying, and only by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::Connection(_))
    }

    /// Transport-supplied condition, for the variants that carry one.
    pub fn condition(&self) -> Option<&str> {
        match self {
            ConnectError::Connection(condition) | ConnectError::Authentication(condition) => {
                Some(condition.as_str())
            }
            ConnectError::InvalidParameter(_) => None,
        }
    }
}
