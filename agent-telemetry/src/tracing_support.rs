//! Structured tracing helpers.

use agent_config::{LogFormat, LoggingConfig};
use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Builds the filter used by [`init`]. `RUST_LOG` takes precedence over the
/// configured directive.
///
/// # Errors
///
/// Returns an error when the configured directive cannot be parsed.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.filter())
        .map_err(|err| anyhow!("invalid log filter `{}`: {err}", config.filter()))
}

/// Installs the global `tracing` subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error when the filter is invalid or a global subscriber has
/// already been installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_ansi(config.ansi())
        .with_writer(std::io::stderr);

    let installed = match config.format() {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Full => builder.try_init(),
    };

    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}
