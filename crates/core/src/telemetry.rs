//! Process-wide `tracing` subscriber setup for hosts embedding Perch.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::error::{PerchError, Result};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when it is set. Fails if a
/// global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|error| PerchError::Telemetry(error.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };

    installed.map_err(|error| PerchError::Telemetry(error.to_string()))?;
    tracing::debug!(level = %config.level, json = config.json, "telemetry initialized");
    Ok(())
}
