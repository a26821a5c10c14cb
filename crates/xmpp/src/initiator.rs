use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use perch_core::config::ConnectionConfig;
use perch_core::event::{Channel, Event, EventBus, EventPayload, EventSource, LifecycleState};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Sleep, sleep};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::debug::frame_logger;
use crate::error::ConnectError;
use crate::jid::with_generated_resource;
use crate::mechanism::{DEFAULT_MECHANISMS, SaslMechanism};
use crate::request::{ConnectRequest, Credential};
use crate::resolver::{Resolution, resolve};
use crate::status::{Status, StatusEvent};
use crate::transport::{
    CustomHeaders, SessionConfig, SessionTransport, StatusSender, TransportSession,
};

/// How long an `Attached` acknowledgment must stand before it counts.
pub const DEFAULT_ATTACH_GRACE_PERIOD: Duration = Duration::from_millis(1000);

const STATUS_STREAM_CLOSED: &str = "transport closed the status stream before settling";
const ATTEMPT_DROPPED: &str = "connection attempt ended without an outcome";

#[derive(Debug, Clone)]
pub struct InitiatorOptions {
    /// Forward every raw frame to the log (and the event bus, if any).
    pub debug: bool,
    pub attach_grace_period: Duration,
    pub mechanisms: Vec<SaslMechanism>,
}

impl InitiatorOptions {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            debug: config.debug,
            attach_grace_period: Duration::from_millis(config.attach_grace_period_ms),
            ..Self::default()
        }
    }
}

impl Default for InitiatorOptions {
    fn default() -> Self {
        Self {
            debug: false,
            attach_grace_period: DEFAULT_ATTACH_GRACE_PERIOD,
            mechanisms: DEFAULT_MECHANISMS.to_vec(),
        }
    }
}

/// A settled, successful attempt. The caller owns the session from here on.
#[derive(Debug)]
pub struct ConnectionOutcome<S> {
    pub session: S,
    pub status: Status,
    pub condition: String,
}

type AttemptResult<S> = Result<ConnectionOutcome<S>, ConnectError>;

/// Outcome future of one attempt. Resolves exactly once.
///
/// Dropping it abandons the attempt; a session that still connects
/// afterwards is dropped instead of being handed over.
#[derive(Debug)]
pub struct PendingConnection<S> {
    jid: String,
    attempt_id: Uuid,
    receiver: oneshot::Receiver<AttemptResult<S>>,
}

impl<S> PendingConnection<S> {
    /// Identity the command was issued with, after normalization.
    pub fn jid(&self) -> &str {
        &self.jid
    }

    /// Correlation id stamped on every event of this attempt.
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }
}

impl<S> Future for PendingConnection<S> {
    type Output = AttemptResult<S>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|settled| {
            settled.unwrap_or_else(|_| Err(ConnectError::Connection(ATTEMPT_DROPPED.to_string())))
        })
    }
}

/// Starts connection attempts against a [`SessionTransport`].
///
/// Attempts are spawned on the current Tokio runtime and are independent of
/// each other.
pub struct ConnectionInitiator<T> {
    transport: T,
    options: InitiatorOptions,
    event_bus: Option<Arc<dyn EventBus>>,
}

impl<T> ConnectionInitiator<T>
where
    T: SessionTransport,
{
    pub fn new(transport: T, options: InitiatorOptions) -> Self {
        Self {
            transport,
            options,
            event_bus: None,
        }
    }

    pub fn with_event_bus(
        transport: T,
        options: InitiatorOptions,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            transport,
            options,
            event_bus: Some(event_bus),
        }
    }

    pub fn options(&self) -> &InitiatorOptions {
        &self.options
    }

    /// Dispatch on the credential form.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect(
        &self,
        request: ConnectRequest,
    ) -> Result<PendingConnection<T::Session>, ConnectError> {
        let ConnectRequest {
            endpoint,
            jid,
            credential,
            custom_headers,
        } = request;

        match credential {
            Credential::Password(password) => {
                self.connect_with_password(&endpoint, &jid, &password, custom_headers)
            }
            Credential::Resume {
                session_id,
                request_id,
            } => self.attach_existing_session(
                &endpoint,
                &jid,
                &session_id,
                &request_id,
                custom_headers,
            ),
        }
    }

    /// Fresh login. A resource is generated when `jid` has none.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect_with_password(
        &self,
        endpoint: &str,
        jid: &str,
        password: &str,
        custom_headers: Option<CustomHeaders>,
    ) -> Result<PendingConnection<T::Session>, ConnectError> {
        check_basic_parameters(endpoint, jid)?;
        let jid = with_generated_resource(jid);

        debug!(%endpoint, %jid, "establishing a new connection");
        Ok(self.start_attempt(endpoint, jid, custom_headers, |session, jid, on_status| {
            session.login_with_password(jid, password, on_status);
        }))
    }

    /// Attach to a live session. `jid` is used as given.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn attach_existing_session(
        &self,
        endpoint: &str,
        jid: &str,
        session_id: &str,
        request_id: &str,
        custom_headers: Option<CustomHeaders>,
    ) -> Result<PendingConnection<T::Session>, ConnectError> {
        check_basic_parameters(endpoint, jid)?;
        if session_id.is_empty() {
            return Err(ConnectError::InvalidParameter(
                "cannot attach without a session id".to_string(),
            ));
        }
        if request_id.is_empty() {
            return Err(ConnectError::InvalidParameter(
                "cannot attach without a request id".to_string(),
            ));
        }

        debug!(%endpoint, %jid, "attaching to an existing session");
        Ok(self.start_attempt(
            endpoint,
            jid.to_string(),
            custom_headers,
            |session, jid, on_status| {
                session.attach(jid, session_id, request_id, on_status);
            },
        ))
    }

    fn start_attempt(
        &self,
        endpoint: &str,
        jid: String,
        custom_headers: Option<CustomHeaders>,
        issue: impl FnOnce(&mut T::Session, &str, StatusSender),
    ) -> PendingConnection<T::Session> {
        let attempt_id = Uuid::new_v4();
        let mut session = self
            .transport
            .create_session(endpoint, self.session_config(custom_headers));

        let reporter = EventReporter {
            event_bus: self.event_bus.clone(),
            attempt_id,
        };
        reporter.lifecycle(LifecycleState::Establishing);

        let (on_status, statuses) = StatusSender::channel();
        issue(&mut session, &jid, on_status);

        let (settlement, receiver) = oneshot::channel();
        let attempt = Attempt {
            session,
            jid: jid.clone(),
            statuses,
            settlement,
            grace_period: self.options.attach_grace_period,
            reporter,
        };
        let span = info_span!("connection_attempt", attempt = %attempt_id);
        tokio::spawn(attempt.run().instrument(span));

        PendingConnection {
            jid,
            attempt_id,
            receiver,
        }
    }

    fn session_config(&self, custom_headers: Option<CustomHeaders>) -> SessionConfig {
        let mut config = SessionConfig::new(custom_headers);
        config.mechanisms = self.options.mechanisms.clone();
        if self.options.debug {
            config.frame_observer = Some(frame_logger(self.event_bus.clone()));
        }
        config
    }
}

fn check_basic_parameters(endpoint: &str, jid: &str) -> Result<(), ConnectError> {
    if jid.is_empty() {
        return Err(ConnectError::InvalidParameter("cannot log in without a jid".to_string()));
    }
    if endpoint.is_empty() {
        return Err(ConnectError::InvalidParameter(
            "cannot log in without an endpoint url".to_string(),
        ));
    }
    Ok(())
}

/// Publishes the attempt's lifecycle on the bus, if there is one.
struct EventReporter {
    event_bus: Option<Arc<dyn EventBus>>,
    attempt_id: Uuid,
}

impl EventReporter {
    fn lifecycle(&self, state: LifecycleState) {
        info!(attempt = %self.attempt_id, ?state, "connection lifecycle changed");
        self.emit(
            "system.connection.state",
            EventPayload::LifecycleChanged { state },
        );
    }

    fn established(&self, jid: &str) {
        self.lifecycle(LifecycleState::Connected);
        self.emit(
            "system.connection.established",
            EventPayload::ConnectionEstablished {
                jid: jid.to_string(),
            },
        );
    }

    fn failed(&self, error: &ConnectError) {
        self.lifecycle(LifecycleState::Disconnected);
        self.emit(
            "system.error.occurred",
            EventPayload::ErrorOccurred {
                component: "connection".to_string(),
                message: error.to_string(),
                recoverable: error.is_retryable(),
            },
        );
    }

    fn emit(&self, channel_name: &str, payload: EventPayload) {
        let Some(event_bus) = &self.event_bus else {
            return;
        };

        let channel = match Channel::new(channel_name) {
            Ok(channel) => channel,
            Err(error) => {
                warn!(channel = channel_name, %error, "invalid event channel");
                return;
            }
        };

        let event = Event::with_correlation(channel, EventSource::Xmpp, payload, self.attempt_id);
        if let Err(error) = event_bus.publish(event) {
            warn!(channel = channel_name, %error, "event publish failed");
        }
    }
}

enum Step {
    Status(Option<StatusEvent>),
    GraceElapsed,
}

/// Drives one attempt from command to settlement.
struct Attempt<S> {
    session: S,
    jid: String,
    statuses: mpsc::UnboundedReceiver<StatusEvent>,
    settlement: oneshot::Sender<AttemptResult<S>>,
    grace_period: Duration,
    reporter: EventReporter,
}

impl<S> Attempt<S>
where
    S: TransportSession,
{
    async fn run(self) {
        let Attempt {
            mut session,
            jid,
            mut statuses,
            settlement,
            grace_period,
            reporter,
        } = self;

        let mut grace: Option<(Pin<Box<Sleep>>, StatusEvent)> = None;
        let mut stream_open = true;

        let settled = loop {
            let step = match grace.as_mut() {
                Some((timer, _)) if stream_open => tokio::select! {
                    biased;
                    event = statuses.recv() => Step::Status(event),
                    () = timer => Step::GraceElapsed,
                },
                Some((timer, _)) => {
                    timer.await;
                    Step::GraceElapsed
                }
                None => Step::Status(statuses.recv().await),
            };

            let event = match step {
                Step::GraceElapsed => match grace.take() {
                    Some((_, attached)) => break Ok(attached),
                    None => continue,
                },
                // Nothing can reject an acknowledged attach anymore.
                Step::Status(None) if grace.is_some() => {
                    debug!(%jid, "status stream closed during grace period");
                    stream_open = false;
                    continue;
                }
                Step::Status(None) => {
                    break Err(ConnectError::Connection(STATUS_STREAM_CLOSED.to_string()));
                }
                Step::Status(Some(event)) => event,
            };

            match resolve(&event) {
                Resolution::Pending => {}
                Resolution::Succeed => break Ok(event),
                Resolution::Fail(error) => break Err(error),
                Resolution::SucceedAfterGrace if grace.is_some() => {
                    debug!(%jid, "repeated attach acknowledgment during grace period");
                }
                Resolution::SucceedAfterGrace => {
                    // Flush now so the next request does not reuse a stale request id.
                    session.flush_outbound();
                    grace = Some((Box::pin(sleep(grace_period)), event));
                }
            }
        };

        match settled {
            Ok(event) => {
                info!(%jid, status = %event.status, "connection established");
                reporter.established(&jid);
                let outcome = ConnectionOutcome {
                    session,
                    status: event.status,
                    condition: event.condition,
                };
                if settlement.send(Ok(outcome)).is_err() {
                    debug!(%jid, "attempt abandoned by caller; dropping live session");
                }
            }
            Err(error) => {
                warn!(%jid, %error, "connection attempt failed");
                reporter.failed(&error);
                drop(session);
                let _ = settlement.send(Err(error));
            }
        }

        while let Some(late) = statuses.recv().await {
            debug!(
                %jid,
                status = %late.status,
                condition = %late.condition,
                "status after settlement ignored"
            );
        }
    }
}
