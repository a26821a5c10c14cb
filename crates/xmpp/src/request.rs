use perch_core::config::Config;

use crate::error::ConnectError;
use crate::transport::CustomHeaders;

/// How the client proves who it is for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Fresh login.
    Password(String),
    /// Attach to a live server-side session.
    Resume {
        session_id: String,
        request_id: String,
    },
}

/// Inputs of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub endpoint: String,
    pub jid: String,
    pub credential: Credential,
    pub custom_headers: Option<CustomHeaders>,
}

impl ConnectRequest {
    pub fn with_password(
        endpoint: impl Into<String>,
        jid: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            jid: jid.into(),
            credential: Credential::Password(password.into()),
            custom_headers: None,
        }
    }

    pub fn resume(
        endpoint: impl Into<String>,
        jid: impl Into<String>,
        session_id: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            jid: jid.into(),
            credential: Credential::Resume {
                session_id: session_id.into(),
                request_id: request_id.into(),
            },
            custom_headers: None,
        }
    }

    pub fn custom_headers(mut self, headers: CustomHeaders) -> Self {
        self.custom_headers = Some(headers);
        self
    }

    /// Build a request from a validated [`Config`].
    pub fn from_config(config: &Config) -> Result<Self, ConnectError> {
        let account = &config.account;
        let credential = match (
            &account.password,
            &account.session_id,
            &account.request_id,
        ) {
            (Some(password), None, None) => Credential::Password(password.clone()),
            (None, Some(session_id), Some(request_id)) => Credential::Resume {
                session_id: session_id.clone(),
                request_id: request_id.clone(),
            },
            _ => {
                return Err(ConnectError::InvalidParameter(
                    "account needs either a password or a session_id/request_id pair".to_string(),
                ));
            }
        };

        let headers = &config.connection.custom_headers;
        Ok(Self {
            endpoint: config.connection.url.clone(),
            jid: account.jid.clone(),
            credential,
            custom_headers: (!headers.is_empty()).then(|| headers.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use perch_core::config::{AccountConfig, ConnectionConfig, EventBusConfig, LoggingConfig};

    use super::*;

    fn config(password: Option<&str>, session: Option<(&str, &str)>) -> Config {
        Config {
            account: AccountConfig {
                jid: "alice@example.com/desk".to_string(),
                password: password.map(str::to_string),
                session_id: session.map(|(sid, _)| sid.to_string()),
                request_id: session.map(|(_, rid)| rid.to_string()),
            },
            connection: ConnectionConfig {
                url: "https://example.com/http-bind/".to_string(),
                debug: false,
                attach_grace_period_ms: 1000,
                custom_headers: Default::default(),
            },
            logging: LoggingConfig::default(),
            event_bus: EventBusConfig::default(),
        }
    }

    #[test]
    fn password_config_becomes_password_request() {
        let request = ConnectRequest::from_config(&config(Some("secret"), None)).unwrap();
        assert_eq!(request.credential, Credential::Password("secret".to_string()));
        assert_eq!(request.endpoint, "https://example.com/http-bind/");
        assert!(request.custom_headers.is_none());
    }

    #[test]
    fn session_config_becomes_resume_request() {
        let request = ConnectRequest::from_config(&config(None, Some(("8a2f", "4711")))).unwrap();
        assert_matches!(
            request.credential,
            Credential::Resume { session_id, request_id } if session_id == "8a2f" && request_id == "4711"
        );
    }

    #[test]
    fn ambiguous_config_is_rejected() {
        let result = ConnectRequest::from_config(&config(Some("secret"), Some(("8a2f", "4711"))));
        assert_matches!(result, Err(ConnectError::InvalidParameter(_)));
    }

    #[test]
    fn builder_helpers_fill_the_tagged_credential() {
        let request = ConnectRequest::resume("https://example.com/http-bind/", "a@b/c", "sid", "42")
            .custom_headers(CustomHeaders::from([("X-Tenant".to_string(), "blue".to_string())]));
        assert_eq!(
            request.credential,
            Credential::Resume {
                session_id: "sid".to_string(),
                request_id: "42".to_string(),
            }
        );
        assert_eq!(request.custom_headers.map(|h| h.len()), Some(1));
    }
}
