//! Configuration loader implementations.
//!
//! Files are JSON documents; every section is optional and falls back to its
//! defaults. Environment overrides are applied after the file is parsed.

use std::fs;
use std::path::Path;
use std::time::Duration;

use agent_primitives::EnvironmentManifest;
use anyhow::{Context, Result};
use tracing::debug;

use crate::schema::RuntimeConfig;

/// Overrides the interpreter executable.
pub const ENV_PYTHON: &str = "WORKBENCH_PYTHON";
/// Overrides the default fragment deadline, in milliseconds.
pub const ENV_DEADLINE_MS: &str = "WORKBENCH_DEADLINE_MS";
/// Overrides the log filter directive.
pub const ENV_LOG: &str = "WORKBENCH_LOG";

/// Reads and validates a runtime configuration file.
///
/// # Errors
///
/// Fails when the file cannot be read, is not valid JSON for
/// [`RuntimeConfig`], or does not pass validation.
pub fn load(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: RuntimeConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config file {}", path.display()))?;
    debug!(path = %path.display(), "loaded runtime configuration");
    Ok(config)
}

/// Loads the configuration at `path` when given, otherwise the defaults, then
/// applies overrides from the process environment.
///
/// # Errors
///
/// Propagates [`load`] failures and rejects malformed overrides.
pub fn load_or_default(path: Option<&Path>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => load(path)?,
        None => RuntimeConfig::default(),
    };
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Applies `WORKBENCH_*` overrides read through `lookup`.
///
/// # Errors
///
/// Returns an error when an override cannot be parsed or the resulting
/// configuration fails validation.
pub fn apply_env_overrides<F>(mut config: RuntimeConfig, lookup: F) -> Result<RuntimeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(program) = lookup(ENV_PYTHON) {
        debug!(program = %program, "interpreter overridden from environment");
        let mut interpreter = config.interpreter().clone();
        interpreter.set_program(program);
        config = config.with_interpreter(interpreter);
    }

    if let Some(raw) = lookup(ENV_DEADLINE_MS) {
        let millis: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("{ENV_DEADLINE_MS} must be an integer, got `{raw}`"))?;
        let session = config
            .session()
            .clone()
            .with_default_deadline(Some(Duration::from_millis(millis)));
        config = config.with_session(session);
    }

    if let Some(filter) = lookup(ENV_LOG) {
        let logging = config.logging().clone().with_filter(filter);
        config = config.with_logging(logging);
    }

    config.validate()?;
    Ok(config)
}

/// Reads an environment manifest describing datasets and libraries.
///
/// # Errors
///
/// Fails when the file cannot be read or the manifest is malformed.
pub fn load_environment(path: impl AsRef<Path>) -> Result<EnvironmentManifest> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read environment manifest {}", path.display()))?;
    let manifest: EnvironmentManifest = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse environment manifest {}", path.display()))?;
    debug!(
        path = %path.display(),
        datasets = manifest.datasets().map_or(0, |d| d.len()),
        libraries = manifest.libraries().map_or(0, |l| l.len()),
        "loaded environment manifest"
    );
    Ok(manifest)
}
