//! Tracing subscriber construction.
//!
//! The library itself never installs a global subscriber; the binary does it
//! here and hands the same [`Dispatch`] to the pipeline.

use anyhow::Result;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Build a subscriber from config. `RUST_LOG`, when set and valid, wins over `logging.level`.
pub fn build_dispatch(config: &LoggingConfig) -> Result<Dispatch> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let dispatch = match config.format {
        LogFormat::Json => Dispatch::new(builder.json().finish()),
        LogFormat::Pretty => Dispatch::new(builder.finish()),
    };
    Ok(dispatch)
}

/// Build the subscriber and make it the process-wide default.
pub fn init(config: &LoggingConfig) -> Result<Dispatch> {
    let dispatch = build_dispatch(config)?;
    tracing::dispatcher::set_global_default(dispatch.clone())?;
    Ok(dispatch)
}
