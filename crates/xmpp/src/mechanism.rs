use std::collections::HashSet;

/// SASL mechanisms a session is allowed to negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaslMechanism {
    Anonymous,
    External,
    Plain,
    ScramSha1,
}

impl SaslMechanism {
    pub fn name(&self) -> &'static str {
        match self {
            SaslMechanism::Anonymous => "ANONYMOUS",
            SaslMechanism::External => "EXTERNAL",
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha1 => "SCRAM-SHA-1",
        }
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed mechanism list handed to every session, in order.
pub const DEFAULT_MECHANISMS: &[SaslMechanism] = &[
    SaslMechanism::Anonymous,
    SaslMechanism::External,
    SaslMechanism::Plain,
    SaslMechanism::ScramSha1,
];

/// First mechanism from `allowed` that the server advertises.
pub fn select_mechanism(
    allowed: &[SaslMechanism],
    server_mechanisms: &HashSet<String>,
) -> Option<SaslMechanism> {
    allowed
        .iter()
        .find(|m| server_mechanisms.contains(m.name()))
        .copied()
}
