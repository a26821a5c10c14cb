use thiserror::Error;

/// The shared error type for Perch host-side plumbing.
#[derive(Error, Debug)]
pub enum PerchError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for Perch operations.
pub type Result<T> = std::result::Result<T, PerchError>;

#[derive(thiserror::Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Subscriber lagged: {0} events missed")]
    Lagged(u64),
}
