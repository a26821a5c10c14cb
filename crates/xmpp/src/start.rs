use tracing::warn;
use xmpp_parsers::jid::Jid;

use crate::error::ConnectError;
use crate::initiator::{ConnectionInitiator, ConnectionOutcome};
use crate::request::{ConnectRequest, Credential};
use crate::transport::SessionTransport;

/// Run one attempt to completion.
///
/// Resuming a session additionally requires a full JID: the resource is
/// what ties the identity to the session being resumed.
pub async fn start<T>(
    initiator: &ConnectionInitiator<T>,
    request: ConnectRequest,
) -> Result<ConnectionOutcome<T::Session>, ConnectError>
where
    T: SessionTransport,
{
    if matches!(request.credential, Credential::Resume { .. }) && !names_resource(&request.jid) {
        return Err(ConnectError::InvalidParameter(
            "a session resume needs a JID with resource".to_string(),
        ));
    }

    let result = match initiator.connect(request) {
        Ok(pending) => pending.await,
        Err(error) => Err(error),
    };

    if let Err(error) = &result {
        warn!(%error, retryable = error.is_retryable(), "start failed");
    }
    result
}

fn names_resource(jid: &str) -> bool {
    jid.parse::<Jid>()
        .map(|jid| jid.resource().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_check_parses_the_jid() {
        assert!(names_resource("alice@example.com/desk"));
        assert!(!names_resource("alice@example.com"));
        assert!(!names_resource("alice@example.com/"));
        assert!(!names_resource("@example.com/desk"));
    }
}
