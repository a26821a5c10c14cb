use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::mechanism::{DEFAULT_MECHANISMS, SaslMechanism};
use crate::status::{Status, StatusEvent};

/// Extra HTTP headers forwarded verbatim to the transport.
pub type CustomHeaders = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    Inbound,
    Outbound,
}

/// Receives every raw frame the transport reads or writes. Must not block.
pub type FrameObserver = Arc<dyn Fn(FrameDirection, &str) + Send + Sync>;

/// Everything a transport needs to build one session.
#[derive(Clone)]
pub struct SessionConfig {
    pub custom_headers: Option<CustomHeaders>,
    pub mechanisms: Vec<SaslMechanism>,
    pub frame_observer: Option<FrameObserver>,
}

impl SessionConfig {
    pub fn new(custom_headers: Option<CustomHeaders>) -> Self {
        Self {
            custom_headers,
            mechanisms: DEFAULT_MECHANISMS.to_vec(),
            frame_observer: None,
        }
    }

    /// Forward a raw frame to the observer, if one is installed.
    pub fn observe_frame(&self, direction: FrameDirection, frame: &str) {
        if let Some(observer) = &self.frame_observer {
            observer(direction, frame);
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("custom_headers", &self.custom_headers)
            .field("mechanisms", &self.mechanisms)
            .field("frame_observer", &self.frame_observer.is_some())
            .finish()
    }
}

/// Handle through which a transport reports status changes for one attempt.
#[derive(Debug, Clone)]
pub struct StatusSender {
    inner: mpsc::UnboundedSender<StatusEvent>,
}

impl StatusSender {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (inner, receiver) = mpsc::unbounded_channel();
        (Self { inner }, receiver)
    }

    /// Report a status. Returns `false` once nobody is listening anymore.
    pub fn emit(&self, status: Status, condition: impl Into<String>) -> bool {
        self.inner
            .send(StatusEvent::new(status, condition))
            .is_ok()
    }

    /// Report a raw numeric status code.
    pub fn emit_code(&self, code: u8, condition: impl Into<String>) -> bool {
        self.emit(Status::from_code(code), condition)
    }
}

/// Factory for transport sessions (the stream library's connection object).
pub trait SessionTransport: Send + Sync + 'static {
    type Session: TransportSession;

    fn create_session(&self, endpoint: &str, config: SessionConfig) -> Self::Session;
}

/// One live (or in-progress) transport session.
///
/// Commands return immediately; progress arrives through the
/// [`StatusSender`], possibly from another task.
pub trait TransportSession: Send + 'static {
    fn login_with_password(&mut self, jid: &str, password: &str, on_status: StatusSender);

    fn attach(&mut self, jid: &str, session_id: &str, request_id: &str, on_status: StatusSender);

    /// Send any buffered outbound data now.
    fn flush_outbound(&mut self);
}
