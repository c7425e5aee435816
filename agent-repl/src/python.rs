//! Python interpreter backed by a persistent child process.
//!
//! The child runs a small driver script that keeps one namespace alive across
//! requests. Fragment output is captured inside the child; the process's own
//! stdout is reserved for protocol lines and its stderr is forwarded to
//! `tracing` at debug level.

use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use agent_config::InterpreterConfig;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{InterpreterError, InterpreterResult};
use crate::interpreter::{DEADLINE_KIND, EXITED_KIND, Interpreter, InterpreterFactory};
use crate::outcome::{CapturedResult, ExecutionFailure};
use crate::protocol::{self, Request, Response};

const DRIVER_SOURCE: &str = include_str!("driver.py");

struct DriverProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    pending: Vec<u8>,
    torn_write: bool,
    stderr_task: JoinHandle<()>,
}

impl DriverProcess {
    fn launch(config: &InterpreterConfig) -> InterpreterResult<Self> {
        let mut command = Command::new(config.program());
        command
            .args(config.args())
            .arg("-u")
            .arg("-c")
            .arg(DRIVER_SOURCE)
            .envs(config.env())
            .env("PYTHONUNBUFFERED", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = config.working_dir() {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| InterpreterError::Spawn {
            program: config.program().display().to_string(),
            source,
        })?;
        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(InterpreterError::Protocol {
                reason: "interpreter pipes were not captured".into(),
            });
        };
        let stderr_task = tokio::spawn(forward_stderr(stderr, child.id()));

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            pending: Vec::new(),
            torn_write: false,
            stderr_task,
        })
    }

    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(mut self) -> Option<ExitStatus> {
        let _ = self.child.start_kill();
        let status = self.child.wait().await.ok();
        self.stderr_task.abort();
        status
    }

    /// Closes stdin so the driver exits on its own, killing it after `grace`.
    async fn close(self, grace: Duration) -> Option<ExitStatus> {
        let Self {
            mut child,
            stdin,
            stderr_task,
            ..
        } = self;
        drop(stdin);

        let status = match timeout(grace, child.wait()).await {
            Ok(status) => status.ok(),
            Err(_) => {
                let _ = child.start_kill();
                child.wait().await.ok()
            }
        };
        stderr_task.abort();
        status
    }
}

async fn forward_stderr(stderr: ChildStderr, pid: Option<u32>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(pid, line = %line, "interpreter stderr");
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// A `python3` child process holding one persistent namespace.
///
/// When a fragment outlives its deadline by more than the configured kill
/// grace, or the process dies, the child is replaced and the failure is
/// reported with [`ExecutionFailure::interpreter_restarted`] set. A child
/// replaced between fragments, e.g. after a cancelled request, is reported on
/// the next [`CapturedResult`] instead.
pub struct PythonInterpreter {
    config: InterpreterConfig,
    process: Option<DriverProcess>,
    next_id: u64,
    closed: bool,
    unreported_restart: bool,
    version: Option<String>,
}

impl fmt::Debug for PythonInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PythonInterpreter")
            .field("program", &self.config.program())
            .field("pid", &self.pid())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl PythonInterpreter {
    /// Launches the interpreter and waits for its handshake.
    ///
    /// # Errors
    ///
    /// Returns [`InterpreterError::Spawn`] when the program cannot be started
    /// and [`InterpreterError::Startup`] when it does not answer within the
    /// startup timeout.
    pub async fn spawn(config: InterpreterConfig) -> InterpreterResult<Self> {
        let mut interpreter = Self {
            config,
            process: None,
            next_id: 0,
            closed: false,
            unreported_restart: false,
            version: None,
        };
        interpreter.start().await?;
        Ok(interpreter)
    }

    /// OS process id of the current child, if one is running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(DriverProcess::pid)
    }

    /// `sys.version` reported by the child during its handshake.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    async fn start(&mut self) -> InterpreterResult<()> {
        self.process = Some(DriverProcess::launch(&self.config)?);

        let startup = self.config.startup_timeout();
        let handshake = match timeout(startup, self.exchange(Request::Ping)).await {
            Ok(result) => result.map_err(|err| InterpreterError::Startup {
                reason: err.to_string(),
            }),
            Err(_) => Err(InterpreterError::Startup {
                reason: format!("no handshake within {}ms", startup.as_millis()),
            }),
        };

        match handshake {
            Ok(response) => {
                self.version = response.value.as_str().map(str::to_owned);
                info!(
                    pid = self.pid(),
                    version = self.version.as_deref().unwrap_or("unknown"),
                    "python interpreter ready"
                );
                Ok(())
            }
            Err(err) => {
                self.discard().await;
                Err(err)
            }
        }
    }

    async fn discard(&mut self) -> Option<ExitStatus> {
        match self.process.take() {
            Some(process) => process.terminate().await,
            None => None,
        }
    }

    async fn restart(&mut self) -> InterpreterResult<()> {
        if let Some(status) = self.discard().await {
            debug!(%status, "previous interpreter reaped");
        }
        self.start().await
    }

    async fn ensure_process(&mut self) -> InterpreterResult<()> {
        if self.closed {
            return Err(InterpreterError::ShutDown);
        }
        match self.process.as_ref().map(|process| process.torn_write) {
            Some(false) => return Ok(()),
            Some(true) => {
                warn!("previous request was abandoned mid-write; restarting interpreter");
            }
            None => warn!("interpreter is not running; restarting"),
        }
        self.restart().await?;
        self.unreported_restart = true;
        Ok(())
    }

    async fn exchange(&mut self, request: Request) -> InterpreterResult<Response> {
        self.next_id += 1;
        let id = self.next_id;
        let process = self.process.as_mut().ok_or(InterpreterError::Exited)?;

        process.torn_write = true;
        let result = match protocol::write_request(&mut process.stdin, id, &request).await {
            Ok(()) => {
                process.torn_write = false;
                protocol::read_response(&mut process.stdout, &mut process.pending, id).await
            }
            Err(InterpreterError::Io { source }) if source.kind() == io::ErrorKind::BrokenPipe => {
                Err(InterpreterError::Exited)
            }
            Err(err) => Err(err),
        };

        if matches!(result, Err(InterpreterError::Exited)) {
            let status = self.discard().await;
            warn!(?status, "python interpreter exited");
        }
        result
    }
}

#[async_trait]
impl Interpreter for PythonInterpreter {
    async fn execute(
        &mut self,
        fragment: &str,
        deadline: Option<Duration>,
    ) -> InterpreterResult<CapturedResult> {
        self.ensure_process().await?;
        let started = Instant::now();
        let request = Request::Exec {
            code: fragment.to_owned(),
            deadline_ms: deadline.map(duration_millis),
        };

        let answered = match deadline {
            Some(limit) => {
                let hard_limit = limit + self.config.kill_grace();
                timeout(hard_limit, self.exchange(request)).await.ok()
            }
            None => Some(self.exchange(request).await),
        };

        let result = match answered {
            Some(Ok(response)) => response.into_captured()?,
            Some(Err(InterpreterError::Exited)) => {
                self.restart().await?;
                CapturedResult::failure(
                    "",
                    "",
                    ExecutionFailure::new(
                        EXITED_KIND,
                        "the interpreter process exited while running the fragment",
                    )
                    .with_restart(),
                )
            }
            Some(Err(err)) => return Err(err),
            None => {
                let limit_ms = deadline.map_or(0, duration_millis);
                warn!(deadline_ms = limit_ms, "fragment ignored its deadline; killing interpreter");
                self.restart().await?;
                CapturedResult::failure(
                    "",
                    "",
                    ExecutionFailure::new(
                        DEADLINE_KIND,
                        format!(
                            "fragment did not finish within {limit_ms}ms and the interpreter was restarted"
                        ),
                    )
                    .with_restart(),
                )
            }
        };

        let result = if std::mem::take(&mut self.unreported_restart) {
            result.with_restart_notice()
        } else {
            result
        };
        Ok(result.with_duration(started.elapsed()))
    }

    async fn get_variable(&mut self, name: &str) -> InterpreterResult<Option<Value>> {
        self.ensure_process().await?;
        let response = self
            .exchange(Request::Get {
                name: name.to_owned(),
            })
            .await?;
        if let Some(reason) = response.error_message() {
            return Err(InterpreterError::Variable {
                name: name.to_owned(),
                reason,
            });
        }
        Ok(response.found.then_some(response.value))
    }

    async fn set_variable(&mut self, name: &str, value: Value) -> InterpreterResult<()> {
        self.ensure_process().await?;
        let response = self
            .exchange(Request::Set {
                name: name.to_owned(),
                value,
            })
            .await?;
        match response.error_message() {
            Some(reason) => Err(InterpreterError::Variable {
                name: name.to_owned(),
                reason,
            }),
            None => Ok(()),
        }
    }

    async fn variables(&mut self) -> InterpreterResult<Vec<String>> {
        self.ensure_process().await?;
        let response = self.exchange(Request::Names).await?;
        match response.error_message() {
            Some(reason) => Err(InterpreterError::Protocol { reason }),
            None => Ok(response.names),
        }
    }

    async fn reset(&mut self) -> InterpreterResult<()> {
        self.ensure_process().await?;
        let response = self.exchange(Request::Reset).await?;
        match response.error_message() {
            Some(reason) => Err(InterpreterError::Protocol { reason }),
            None => {
                self.unreported_restart = false;
                Ok(())
            }
        }
    }

    async fn shutdown(&mut self) -> InterpreterResult<()> {
        self.closed = true;
        if let Some(process) = self.process.take() {
            let status = process.close(self.config.kill_grace()).await;
            debug!(?status, "python interpreter shut down");
        }
        Ok(())
    }
}

/// Spawns [`PythonInterpreter`]s from a shared configuration.
#[derive(Clone, Debug, Default)]
pub struct PythonFactory {
    config: InterpreterConfig,
}

impl PythonFactory {
    /// Creates a factory launching interpreters with `config`.
    #[must_use]
    pub fn new(config: InterpreterConfig) -> Self {
        Self { config }
    }

    /// Configuration used for every spawned interpreter.
    #[must_use]
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }
}

#[async_trait]
impl InterpreterFactory for PythonFactory {
    async fn spawn(&self) -> InterpreterResult<Box<dyn Interpreter>> {
        let interpreter = PythonInterpreter::spawn(self.config.clone()).await?;
        Ok(Box::new(interpreter))
    }
}
