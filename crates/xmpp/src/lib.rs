pub mod debug;
pub mod error;
pub mod initiator;
pub mod jid;
pub mod mechanism;
pub mod request;
pub mod resolver;
pub mod start;
pub mod status;
pub mod transport;

pub use error::ConnectError;
pub use initiator::{
    ConnectionInitiator, ConnectionOutcome, DEFAULT_ATTACH_GRACE_PERIOD, InitiatorOptions,
    PendingConnection,
};
pub use mechanism::{DEFAULT_MECHANISMS, SaslMechanism, select_mechanism};
pub use request::{ConnectRequest, Credential};
pub use resolver::{Resolution, resolve};
pub use start::start;
pub use status::{Status, StatusEvent};
pub use transport::{
    CustomHeaders, FrameDirection, FrameObserver, SessionConfig, SessionTransport, StatusSender,
    TransportSession,
};
