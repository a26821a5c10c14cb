//! End-to-end attempts through `start` against the scripted transport.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use perch_core::config::load_config_from_str;
use perch_core::event::{BroadcastEventBus, EventBus, EventPayload, LifecycleState};
use perch_test_support::fixtures;
use perch_test_support::transport::{Command, ScriptedTransport};
use perch_xmpp::{
    ConnectError, ConnectRequest, ConnectionInitiator, FrameDirection, InitiatorOptions,
    SaslMechanism, Status, start,
};
use tokio::time::{Instant, timeout};

const URL: &str = "https://xmpp.example.com/http-bind/";

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn password_config_logs_in_and_connects() {
    let config = load_config_from_str(&fixtures::config("password.toml")).expect("valid config");
    let transport = ScriptedTransport::replying([
        (Status::Connecting, ""),
        (Status::Authenticating, ""),
        (Status::Connected, ""),
    ]);
    let initiator = ConnectionInitiator::new(
        transport.clone(),
        InitiatorOptions::from_config(&config.connection),
    );

    let request = ConnectRequest::from_config(&config).expect("unambiguous credentials");
    let outcome = start(&initiator, request).await.expect("connected");
    assert_eq!(outcome.status, Status::Connected);

    let session = transport.last_session();
    assert_eq!(session.endpoint(), URL);
    assert!(session.config().frame_observer.is_some());
    assert_eq!(
        session
            .config()
            .custom_headers
            .as_ref()
            .and_then(|headers| headers.get("X-Requested-With"))
            .map(String::as_str),
        Some("perch")
    );
    assert_matches!(
        session.commands().as_slice(),
        [Command::Login { jid, password }]
            if jid.starts_with("alice@example.com/perch-")
                && password == "correct horse battery staple"
    );
    assert_eq!(session.flushes(), 0);
    assert_eq!(session.negotiated_mechanism(), Some(SaslMechanism::Plain));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn login_negotiates_first_allowed_mechanism_the_server_offers() {
    let transport = ScriptedTransport::replying([(Status::Connected, "")])
        .offering(&["SCRAM-SHA-1", "X-OAUTH2"]);
    let initiator = ConnectionInitiator::new(transport.clone(), InitiatorOptions::default());

    let request = ConnectRequest::with_password(URL, "alice@example.com", "secret");
    start(&initiator, request).await.expect("connected");

    assert_eq!(
        transport.last_session().negotiated_mechanism(),
        Some(SaslMechanism::ScramSha1)
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn session_config_attaches_after_grace_period() {
    let config = load_config_from_str(&fixtures::config("session.toml")).expect("valid config");
    let transport = ScriptedTransport::replying([(Status::Attached, "")]);
    let initiator = ConnectionInitiator::new(
        transport.clone(),
        InitiatorOptions::from_config(&config.connection),
    );
    let started = Instant::now();

    let request = ConnectRequest::from_config(&config).expect("unambiguous credentials");
    let outcome = start(&initiator, request).await.expect("attached");

    assert_eq!(outcome.status, Status::Attached);
    assert!(started.elapsed() >= Duration::from_millis(250));

    let session = transport.last_session();
    assert_eq!(session.flushes(), 1);
    assert_eq!(session.negotiated_mechanism(), None);
    assert_eq!(
        session.commands(),
        vec![Command::Attach {
            jid: "alice@example.com/desk".to_string(),
            session_id: "8a2f0c1d".to_string(),
            request_id: "2241837".to_string(),
        }]
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn attach_survives_status_stream_closing_during_grace_period() {
    let transport = ScriptedTransport::replying([(Status::Attached, "")]);
    let initiator = ConnectionInitiator::new(transport.clone(), InitiatorOptions::default());
    let started = Instant::now();

    let pending = initiator
        .attach_existing_session(URL, "alice@example.com/desk", "8a2f0c1d", "2241837", None)
        .unwrap();
    transport.last_session().close();

    let outcome = pending.await.expect("attached");
    assert_eq!(outcome.status, Status::Attached);
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(transport.last_session().flushes(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn resume_without_resource_is_rejected_before_any_session() {
    let transport = ScriptedTransport::new();
    let initiator = ConnectionInitiator::new(transport.clone(), InitiatorOptions::default());

    let request = ConnectRequest::resume(URL, "alice@example.com", "8a2f0c1d", "2241837");
    let result = start(&initiator, request).await;

    assert_matches!(result, Err(ConnectError::InvalidParameter(_)));
    assert!(transport.sessions().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn wrong_password_settles_with_authentication_error() {
    let transport = ScriptedTransport::replying([
        (Status::Connecting, ""),
        (Status::Authenticating, ""),
        (Status::AuthFailed, "not-authorized"),
    ]);
    let initiator = ConnectionInitiator::new(transport, InitiatorOptions::default());

    let request = ConnectRequest::with_password(URL, "alice@example.com", "hunter2");
    let error = start(&initiator, request).await.unwrap_err();

    assert_eq!(error, ConnectError::Authentication("not-authorized".to_string()));
    assert!(!error.is_retryable());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn rejected_attach_reports_lifecycle_on_bus() {
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::default());
    let mut lifecycle = bus.subscribe("system.connection.state").unwrap();
    let transport = ScriptedTransport::new();
    let initiator =
        ConnectionInitiator::with_event_bus(transport.clone(), InitiatorOptions::default(), bus);

    let pending = initiator
        .attach_existing_session(URL, "alice@example.com/desk", "8a2f0c1d", "2241837", None)
        .unwrap();
    let session = transport.last_session();
    session.emit(Status::Attached, "");
    session.emit(Status::ConnectionFailed, "item-not-found");

    let error = pending.await.unwrap_err();
    assert_eq!(error, ConnectError::Connection("item-not-found".to_string()));
    assert!(error.is_retryable());

    let states: Vec<_> = [lifecycle.recv().await, lifecycle.recv().await]
        .into_iter()
        .map(|event| event.unwrap().payload)
        .collect();
    assert_matches!(
        states.as_slice(),
        [
            EventPayload::LifecycleChanged { state: LifecycleState::Establishing },
            EventPayload::LifecycleChanged { state: LifecycleState::Disconnected },
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn debug_frames_reach_the_bus_unmodified() {
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::default());
    let mut frames = bus.subscribe("xmpp.debug.stanza.*").unwrap();
    let transport = ScriptedTransport::new();
    let options = InitiatorOptions {
        debug: true,
        ..InitiatorOptions::default()
    };
    let initiator = ConnectionInitiator::with_event_bus(transport.clone(), options, bus);

    let _pending = initiator
        .connect_with_password(URL, "alice@example.com", "secret", None)
        .unwrap();
    let frame = fixtures::frame("session-creation.xml");
    transport.last_session().frame(FrameDirection::Outbound, &frame);

    let event = timeout(Duration::from_secs(1), frames.recv())
        .await
        .expect("frame event published")
        .unwrap();
    assert_matches!(event.payload, EventPayload::RawStanzaSent { stanza } if stanza == frame);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn concurrent_attempts_settle_independently() {
    let transport = ScriptedTransport::new();
    let initiator = ConnectionInitiator::new(transport.clone(), InitiatorOptions::default());

    let first = initiator
        .connect_with_password(URL, "alice@example.com/desk", "secret", None)
        .unwrap();
    let second = initiator
        .connect_with_password(URL, "bob@example.com/desk", "secret", None)
        .unwrap();
    assert_ne!(first.attempt_id(), second.attempt_id());

    let sessions = transport.sessions();
    sessions[1].emit(Status::AuthFailed, "not-authorized");
    sessions[0].emit(Status::Connected, "");

    assert_matches!(first.await, Ok(outcome) if outcome.status == Status::Connected);
    assert_matches!(second.await, Err(ConnectError::Authentication(_)));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn silent_transport_rejects_when_status_stream_closes() {
    let transport = ScriptedTransport::new();
    let initiator = ConnectionInitiator::new(transport.clone(), InitiatorOptions::default());

    let pending = initiator
        .connect_with_password(URL, "alice@example.com/desk", "secret", None)
        .unwrap();
    transport.last_session().close();

    assert_matches!(pending.await, Err(ConnectError::Connection(_)));
}
