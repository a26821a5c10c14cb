pub mod fixtures {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    pub fn root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("tests")
            .join("fixtures")
    }

    pub fn path(relative: impl AsRef<Path>) -> PathBuf {
        root().join(relative.as_ref())
    }

    pub fn read(relative: impl AsRef<Path>) -> io::Result<String> {
        fs::read_to_string(path(relative))
    }

    pub fn config(name: &str) -> String {
        read_or_panic(Path::new("config").join(name))
    }

    pub fn frame(name: &str) -> String {
        read_or_panic(Path::new("frames").join(name))
    }

    fn read_or_panic(relative: impl AsRef<Path>) -> String {
        let relative = relative.as_ref();
        read(relative).unwrap_or_else(|error| {
            panic!(
                "failed to read fixture {}: {error}",
                relative.to_string_lossy()
            )
        })
    }
}

pub mod transport {
    //! A [`SessionTransport`] whose sessions do nothing on their own.
    //!
    //! Tests drive an attempt by emitting statuses through the recorded
    //! [`SessionHandle`], or by scripting replies up front.

    use std::collections::HashSet;
    use std::sync::{Arc, Mutex, MutexGuard};

    use perch_xmpp::mechanism::{SaslMechanism, select_mechanism};
    use perch_xmpp::status::Status;
    use perch_xmpp::transport::{
        FrameDirection, SessionConfig, SessionTransport, StatusSender, TransportSession,
    };

    /// A command issued on a scripted session.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Command {
        Login {
            jid: String,
            password: String,
        },
        Attach {
            jid: String,
            session_id: String,
            request_id: String,
        },
    }

    #[derive(Debug, Default)]
    struct SessionState {
        commands: Vec<Command>,
        flushes: usize,
        negotiated: Option<SaslMechanism>,
        status: Option<StatusSender>,
    }

    /// Test-side view of one session the transport created.
    #[derive(Debug, Clone)]
    pub struct SessionHandle {
        endpoint: String,
        config: SessionConfig,
        state: Arc<Mutex<SessionState>>,
    }

    impl SessionHandle {
        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }

        pub fn config(&self) -> &SessionConfig {
            &self.config
        }

        pub fn commands(&self) -> Vec<Command> {
            self.lock().commands.clone()
        }

        pub fn flushes(&self) -> usize {
            self.lock().flushes
        }

        /// Mechanism the last login settled on against the scripted server offer.
        pub fn negotiated_mechanism(&self) -> Option<SaslMechanism> {
            self.lock().negotiated
        }

        /// Report a status for the most recent command.
        ///
        /// # Panics
        ///
        /// Panics if no command has been issued on this session.
        pub fn emit(&self, status: Status, condition: &str) -> bool {
            let state = self.lock();
            let sender = state
                .status
                .as_ref()
                .unwrap_or_else(|| panic!("no command issued on session to {}", self.endpoint));
            sender.emit(status, condition)
        }

        /// Stop reporting statuses, as a transport that dies silently would.
        pub fn close(&self) {
            self.lock().status = None;
        }

        /// Feed a raw frame through the session's observer, if any.
        pub fn frame(&self, direction: FrameDirection, frame: &str) {
            self.config.observe_frame(direction, frame);
        }

        fn lock(&self) -> MutexGuard<'_, SessionState> {
            self.state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    /// Mechanisms the scripted server advertises unless told otherwise.
    pub const SERVER_MECHANISMS: &[&str] = &["PLAIN", "SCRAM-SHA-1"];

    #[derive(Debug)]
    struct Recorder {
        sessions: Vec<SessionHandle>,
        script: Vec<(Status, String)>,
        offered: HashSet<String>,
    }

    impl Default for Recorder {
        fn default() -> Self {
            Self {
                sessions: Vec::new(),
                script: Vec::new(),
                offered: SERVER_MECHANISMS.iter().map(|name| name.to_string()).collect(),
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct ScriptedTransport {
        recorder: Arc<Mutex<Recorder>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Replace the mechanisms the scripted server advertises.
        pub fn offering(self, mechanisms: &[&str]) -> Self {
            self.lock().offered = mechanisms.iter().map(|name| name.to_string()).collect();
            self
        }

        /// Statuses every new command replies with immediately, in order.
        pub fn replying(script: impl IntoIterator<Item = (Status, &'static str)>) -> Self {
            let transport = Self::default();
            transport.lock().script = script
                .into_iter()
                .map(|(status, condition)| (status, condition.to_string()))
                .collect();
            transport
        }

        pub fn sessions(&self) -> Vec<SessionHandle> {
            self.lock().sessions.clone()
        }

        /// # Panics
        ///
        /// Panics if no session has been created yet.
        pub fn last_session(&self) -> SessionHandle {
            self.lock()
                .sessions
                .last()
                .cloned()
                .unwrap_or_else(|| panic!("transport has not created a session"))
        }

        fn lock(&self) -> MutexGuard<'_, Recorder> {
            self.recorder
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    #[derive(Debug)]
    pub struct ScriptedSession {
        state: Arc<Mutex<SessionState>>,
        script: Vec<(Status, String)>,
        allowed: Vec<SaslMechanism>,
        offered: HashSet<String>,
    }

    impl ScriptedSession {
        fn issue(&mut self, command: Command, on_status: StatusSender) {
            for (status, condition) in &self.script {
                on_status.emit(*status, condition.as_str());
            }
            let mut state = self.lock();
            state.commands.push(command);
            state.status = Some(on_status);
        }

        fn lock(&self) -> MutexGuard<'_, SessionState> {
            self.state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    impl SessionTransport for ScriptedTransport {
        type Session = ScriptedSession;

        fn create_session(&self, endpoint: &str, config: SessionConfig) -> ScriptedSession {
            let state = Arc::new(Mutex::new(SessionState::default()));
            let allowed = config.mechanisms.clone();
            let mut recorder = self.lock();
            recorder.sessions.push(SessionHandle {
                endpoint: endpoint.to_string(),
                config,
                state: state.clone(),
            });
            ScriptedSession {
                state,
                script: recorder.script.clone(),
                allowed,
                offered: recorder.offered.clone(),
            }
        }
    }

    impl TransportSession for ScriptedSession {
        fn login_with_password(&mut self, jid: &str, password: &str, on_status: StatusSender) {
            let command = Command::Login {
                jid: jid.to_string(),
                password: password.to_string(),
            };
            self.lock().negotiated = select_mechanism(&self.allowed, &self.offered);
            self.issue(command, on_status);
        }

        fn attach(
            &mut self,
            jid: &str,
            session_id: &str,
            request_id: &str,
            on_status: StatusSender,
        ) {
            let command = Command::Attach {
                jid: jid.to_string(),
                session_id: session_id.to_string(),
                request_id: request_id.to_string(),
            };
            self.issue(command, on_status);
        }

        fn flush_outbound(&mut self) {
            self.lock().flushes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use perch_xmpp::transport::{SessionConfig, SessionTransport, TransportSession};

    use super::fixtures;
    use super::transport::{Command, ScriptedTransport};

    #[test]
    fn fixture_root_exists() {
        assert!(fixtures::root().is_dir());
    }

    #[test]
    fn loads_config_fixture() {
        let config = fixtures::config("password.toml");
        let toml: toml::Value =
            toml::from_str(&config).expect("password.toml should be valid toml");
        assert!(toml.get("account").is_some());
    }

    #[test]
    fn loads_frame_fixture() {
        let frame = fixtures::frame("session-creation.xml");
        assert!(frame.contains("<body"));
    }

    #[test]
    fn records_sessions_commands_and_flushes() {
        let transport = ScriptedTransport::new();
        let mut session =
            transport.create_session("https://example.com/http-bind/", SessionConfig::new(None));

        session.flush_outbound();

        let handle = transport.last_session();
        assert_eq!(handle.endpoint(), "https://example.com/http-bind/");
        assert_eq!(handle.flushes(), 1);
        assert_eq!(handle.commands(), Vec::<Command>::new());
        assert_eq!(transport.sessions().len(), 1);
    }
}
