//! Strongly typed configuration schemas.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

const DEFAULT_PROGRAM: &str = "python3";
const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_KILL_GRACE_MS: u64 = 2_000;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
const DEFAULT_LOG_FILTER: &str = "info";

/// Top-level runtime configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    interpreter: InterpreterConfig,
    session: SessionConfig,
    logging: LoggingConfig,
}

impl RuntimeConfig {
    /// Returns the interpreter process settings.
    #[must_use]
    pub fn interpreter(&self) -> &InterpreterConfig {
        &self.interpreter
    }

    /// Returns the execution session settings.
    #[must_use]
    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Returns the logging settings.
    #[must_use]
    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    /// Replaces the interpreter section.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: InterpreterConfig) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Replaces the session section.
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Replaces the logging section.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.interpreter.validate()?;
        self.session.validate()?;
        self.logging.validate()
    }
}

/// How the interpreter child process is launched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpreterConfig {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    startup_timeout_ms: u64,
    kill_grace_ms: u64,
}

impl InterpreterConfig {
    /// Creates a configuration launching the given interpreter executable.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Interpreter executable.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Extra arguments placed before the driver script.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables for the child process.
    #[must_use]
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Working directory of the child process, if overridden.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Maximum time allowed for the interpreter to answer its first ping.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Extra time granted past a fragment deadline before the process is killed.
    #[must_use]
    pub const fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Appends an interpreter argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds an environment variable for the child process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory of the child process.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the startup timeout.
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout_ms = duration_millis(timeout);
        self
    }

    /// Sets the kill grace period.
    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace_ms = duration_millis(grace);
        self
    }

    pub(crate) fn set_program(&mut self, program: impl Into<PathBuf>) {
        self.program = program.into();
    }

    fn validate(&self) -> Result<()> {
        if self.program.as_os_str().is_empty() {
            bail!("interpreter program cannot be empty");
        }
        if self.startup_timeout_ms == 0 {
            bail!("interpreter startup timeout must be greater than zero");
        }
        Ok(())
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            kill_grace_ms: DEFAULT_KILL_GRACE_MS,
        }
    }
}

/// Behaviour of execution sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    default_deadline_ms: Option<u64>,
    max_output_bytes: usize,
}

impl SessionConfig {
    /// Deadline applied to `run` calls that do not pass their own.
    #[must_use]
    pub fn default_deadline(&self) -> Option<Duration> {
        self.default_deadline_ms.map(Duration::from_millis)
    }

    /// Upper bound on captured bytes per stream and fragment.
    #[must_use]
    pub const fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }

    /// Sets the default deadline.
    #[must_use]
    pub fn with_default_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.default_deadline_ms = deadline.map(duration_millis);
        self
    }

    /// Sets the captured output limit.
    #[must_use]
    pub fn with_max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = limit;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.default_deadline_ms == Some(0) {
            bail!("session default deadline must be greater than zero");
        }
        if self.max_output_bytes == 0 {
            bail!("session output limit must be greater than zero");
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_deadline_ms: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Output style of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated records.
    #[default]
    Compact,
    /// Multi-line, human-oriented records.
    Pretty,
    /// Single-line records with full span context.
    Full,
}

/// Logging configuration consumed by the telemetry bootstrap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    filter: String,
    format: LogFormat,
    ansi: bool,
}

impl LoggingConfig {
    /// `EnvFilter` directive string used when `RUST_LOG` is unset.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Record layout.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Whether ANSI colour codes are emitted.
    #[must_use]
    pub const fn ansi(&self) -> bool {
        self.ansi
    }

    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Sets the record layout.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables ANSI colour codes.
    #[must_use]
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.filter.trim().is_empty() {
            bail!("logging filter cannot be empty");
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_owned(),
            format: LogFormat::default(),
            ansi: true,
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.interpreter().program(), Path::new("python3"));
        assert_eq!(config.session().default_deadline(), None);
        assert_eq!(config.logging().format(), LogFormat::Compact);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{ "session": { "default_deadline_ms": 1500 }, "logging": { "format": "pretty" } }"#,
        )
        .unwrap();

        assert_eq!(
            config.session().default_deadline(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(config.session().max_output_bytes(), DEFAULT_MAX_OUTPUT_BYTES);
        assert_eq!(config.logging().format(), LogFormat::Pretty);
        assert_eq!(config.interpreter().kill_grace(), Duration::from_secs(2));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<RuntimeConfig>(r#"{ "sesion": {} }"#);
        assert!(result.is_err());
    }

    #[test]
    fn zero_values_fail_validation() {
        let config = RuntimeConfig::default()
            .with_session(SessionConfig::default().with_default_deadline(Some(Duration::ZERO)));
        assert!(config.validate().is_err());

        let config = RuntimeConfig::default()
            .with_interpreter(InterpreterConfig::new("python3").with_startup_timeout(Duration::ZERO));
        assert!(config.validate().is_err());

        let config =
            RuntimeConfig::default().with_logging(LoggingConfig::default().with_filter("  "));
        assert!(config.validate().is_err());
    }
}
