use std::fmt;

/// Connection status codes reported by the stream transport.
///
/// Numeric values follow the BOSH/WebSocket client library convention so a
/// transport can forward its raw code through [`Status::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Error,
    Connecting,
    ConnectionFailed,
    Authenticating,
    AuthFailed,
    Connected,
    Disconnected,
    Disconnecting,
    Attached,
    Redirect,
    ConnectionTimeout,
    BindRequired,
    AttachFailed,
    /// A transport-specific code with no standard meaning.
    Other(u8),
}

impl Status {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Status::Error,
            1 => Status::Connecting,
            2 => Status::ConnectionFailed,
            3 => Status::Authenticating,
            4 => Status::AuthFailed,
            5 => Status::Connected,
            6 => Status::Disconnected,
            7 => Status::Disconnecting,
            8 => Status::Attached,
            9 => Status::Redirect,
            10 => Status::ConnectionTimeout,
            11 => Status::BindRequired,
            12 => Status::AttachFailed,
            other => Status::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Status::Error => 0,
            Status::Connecting => 1,
            Status::ConnectionFailed => 2,
            Status::Authenticating => 3,
            Status::AuthFailed => 4,
            Status::Connected => 5,
            Status::Disconnected => 6,
            Status::Disconnecting => 7,
            Status::Attached => 8,
            Status::Redirect => 9,
            Status::ConnectionTimeout => 10,
            Status::BindRequired => 11,
            Status::AttachFailed => 12,
            Status::Other(code) => code,
        }
    }

    /// Diagnostic name, as the transport library spells it.
    pub fn name(self) -> &'static str {
        match self {
            Status::Error => "ERROR",
            Status::Connecting => "CONNECTING",
            Status::ConnectionFailed => "CONNFAIL",
            Status::Authenticating => "AUTHENTICATING",
            Status::AuthFailed => "AUTHFAIL",
            Status::Connected => "CONNECTED",
            Status::Disconnected => "DISCONNECTED",
            Status::Disconnecting => "DISCONNECTING",
            Status::Attached => "ATTACHED",
            Status::Redirect => "REDIRECT",
            Status::ConnectionTimeout => "CONNTIMEOUT",
            Status::BindRequired => "BINDREQUIRED",
            Status::AttachFailed => "ATTACHFAIL",
            Status::Other(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Other(code) => write!(f, "UNKNOWN({code})"),
            known => f.write_str(known.name()),
        }
    }
}

/// One invocation of the transport's status callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: Status,
    pub condition: String,
}

impl StatusEvent {
    pub fn new(status: Status, condition: impl Into<String>) -> Self {
        Self {
            status,
            condition: condition.into(),
        }
    }
}
