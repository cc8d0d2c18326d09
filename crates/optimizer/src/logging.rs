//! Structured logging setup
//!
//! The optimizer logs through `tracing`; applications embedding it call
//! [`init_logging`] once at startup (or install their own subscriber).

use std::io;

use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize logging for the configured level and format.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).with_target(true).json())
            .try_init()?,
        "pretty" => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).with_target(true).pretty())
            .try_init()?,
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stdout).with_target(true).compact())
            .try_init()?,
    }

    tracing::info!(
        target: "elif_graph_optimizer::logging",
        "Logging initialized (level: {}, format: {})",
        config.level,
        config.format
    );

    Ok(())
}
