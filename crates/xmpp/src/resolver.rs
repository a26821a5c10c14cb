use tracing::debug;

use crate::error::ConnectError;
use crate::status::{Status, StatusEvent};

/// What a single status event means for the pending outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Intermediate status; keep waiting.
    Pending,
    /// Resolve with the session now.
    Succeed,
    /// Flush outbound data, then resolve once the grace period passes
    /// without a rejecting status.
    SucceedAfterGrace,
    /// Reject the outcome.
    Fail(ConnectError),
}

/// Map one transport status to its effect on the attempt.
pub fn resolve(event: &StatusEvent) -> Resolution {
    match event.status {
        Status::Disconnected | Status::ConnectionFailed => {
            Resolution::Fail(ConnectError::Connection(event.condition.clone()))
        }
        Status::AuthFailed => {
            Resolution::Fail(ConnectError::Authentication(event.condition.clone()))
        }
        Status::Attached => Resolution::SucceedAfterGrace,
        Status::Connected => Resolution::Succeed,
        other => {
            debug!(
                status = other.name(),
                code = other.code(),
                condition = %event.condition,
                "transport connection status"
            );
            Resolution::Pending
        }
    }
}
