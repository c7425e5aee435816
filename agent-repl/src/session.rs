//! Execution sessions: one interpreter, one namespace, serialized access.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use agent_config::SessionConfig;
use agent_primitives::SessionId;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};
use crate::interpreter::{Interpreter, InterpreterFactory};
use crate::lifecycle::{Lifecycle, SessionEvent, SessionState};
use crate::outcome::CapturedResult;

/// A persistent interpreter namespace that accepts code fragments.
///
/// Calls are serialized: a second `run` waits until the first completes.
/// Variables, functions and imports defined by one fragment are visible to
/// every later fragment until [`reset`](Self::reset) or
/// [`close`](Self::close).
pub struct ExecutionSession {
    id: SessionId,
    lifecycle: Mutex<Lifecycle>,
    interpreter: tokio::sync::Mutex<Box<dyn Interpreter>>,
    config: SessionConfig,
    executions: AtomicU64,
}

impl fmt::Debug for ExecutionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("executions", &self.executions())
            .finish_non_exhaustive()
    }
}

/// Returns the lifecycle to `Ready` even when a `run` future is dropped mid-flight.
struct ExecutingGuard<'a> {
    session: &'a ExecutionSession,
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        let _ = self.session.lifecycle().transition(SessionEvent::Finish);
    }
}

impl ExecutionSession {
    /// Wraps an already running interpreter in a ready session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Lifecycle`] if the lifecycle cannot start.
    pub fn start(interpreter: Box<dyn Interpreter>, config: SessionConfig) -> SessionResult<Self> {
        let id = SessionId::generate();
        let mut lifecycle = Lifecycle::new(id);
        lifecycle.transition(SessionEvent::Start)?;
        info!(session_id = %id, "execution session started");

        Ok(Self {
            id,
            lifecycle: Mutex::new(lifecycle),
            interpreter: tokio::sync::Mutex::new(interpreter),
            config,
            executions: AtomicU64::new(0),
        })
    }

    /// Spawns a fresh interpreter from `factory` and starts a session on it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Interpreter`] when the interpreter fails to start.
    pub async fn spawn(factory: &dyn InterpreterFactory, config: SessionConfig) -> SessionResult<Self> {
        let interpreter = factory.spawn().await?;
        Self::start(interpreter, config)
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lifecycle().state()
    }

    /// Number of fragments submitted so far.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Session behaviour settings.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs `fragment` with the configured default deadline.
    ///
    /// # Errors
    ///
    /// See [`run_with_deadline`](Self::run_with_deadline).
    pub async fn run(&self, fragment: &str) -> SessionResult<CapturedResult> {
        self.run_with_deadline(fragment, self.config.default_deadline())
            .await
    }

    /// Runs `fragment`, interrupting it once `deadline` elapses.
    ///
    /// Errors raised by the fragment come back as a failed [`CapturedResult`];
    /// the session stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after [`close`](Self::close) and
    /// [`SessionError::Interpreter`] when the backend itself breaks.
    pub async fn run_with_deadline(
        &self,
        fragment: &str,
        deadline: Option<Duration>,
    ) -> SessionResult<CapturedResult> {
        let mut interpreter = self.interpreter.lock().await;
        self.apply(SessionEvent::Begin)?;
        let guard = ExecutingGuard { session: self };

        let sequence = self.executions.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            session_id = %self.id,
            sequence,
            bytes = fragment.len(),
            deadline_ms = deadline.map(|limit| limit.as_millis() as u64),
            "running fragment"
        );

        let outcome = interpreter.execute(fragment, deadline).await;
        drop(guard);
        let result = outcome?.truncated(self.config.max_output_bytes());

        match result.failure_details() {
            Some(failure) => info!(
                session_id = %self.id,
                sequence,
                kind = failure.kind(),
                restarted = result.interpreter_restarted(),
                "fragment failed"
            ),
            None => debug!(
                session_id = %self.id,
                sequence,
                elapsed_ms = result.duration().as_millis() as u64,
                restarted = result.interpreter_restarted(),
                "fragment completed"
            ),
        }
        Ok(result)
    }

    /// Reads a variable from the namespace as JSON; `None` when unbound.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after close, or
    /// [`SessionError::Interpreter`] when the value is not JSON-representable.
    pub async fn get_variable(&self, name: &str) -> SessionResult<Option<Value>> {
        let mut interpreter = self.interpreter.lock().await;
        self.ensure_open()?;
        Ok(interpreter.get_variable(name).await?)
    }

    /// Binds `name` to a JSON value in the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after close, or
    /// [`SessionError::Interpreter`] when `name` is not a valid identifier.
    pub async fn set_variable(&self, name: &str, value: Value) -> SessionResult<()> {
        let mut interpreter = self.interpreter.lock().await;
        self.ensure_open()?;
        interpreter.set_variable(name, value).await?;
        debug!(session_id = %self.id, name, "variable bound");
        Ok(())
    }

    /// Lists user-defined names in the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after close.
    pub async fn variables(&self) -> SessionResult<Vec<String>> {
        let mut interpreter = self.interpreter.lock().await;
        self.ensure_open()?;
        Ok(interpreter.variables().await?)
    }

    /// Empties the namespace while keeping the session open.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after close.
    pub async fn reset(&self) -> SessionResult<()> {
        let mut interpreter = self.interpreter.lock().await;
        self.ensure_open()?;
        interpreter.reset().await?;
        info!(session_id = %self.id, "session namespace reset");
        Ok(())
    }

    /// Disposes the namespace and releases the interpreter.
    ///
    /// Waits for an in-flight fragment to finish first. Closing twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Interpreter`] if the interpreter fails to shut down.
    pub async fn close(&self) -> SessionResult<()> {
        let mut interpreter = self.interpreter.lock().await;
        if self.state().is_terminal() {
            return Ok(());
        }
        self.apply(SessionEvent::Dispose)?;
        info!(
            session_id = %self.id,
            executions = self.executions(),
            "closing execution session"
        );
        interpreter.shutdown().await?;
        Ok(())
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.state().is_terminal() {
            return Err(SessionError::Closed { id: self.id });
        }
        Ok(())
    }

    fn apply(&self, event: SessionEvent) -> SessionResult<SessionState> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state().is_terminal() && event != SessionEvent::Dispose {
            return Err(SessionError::Closed { id: self.id });
        }
        Ok(lifecycle.transition(event)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::{InterpreterError, InterpreterResult};
    use crate::outcome::ExecutionFailure;

    #[derive(Default)]
    struct Counters {
        active: AtomicUsize,
        max_active: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    /// Echoes fragments back as stdout and keeps variables in a map.
    struct EchoInterpreter {
        namespace: BTreeMap<String, Value>,
        counters: Arc<Counters>,
    }

    impl EchoInterpreter {
        fn boxed(counters: &Arc<Counters>) -> Box<dyn Interpreter> {
            Box::new(Self {
                namespace: BTreeMap::new(),
                counters: Arc::clone(counters),
            })
        }
    }

    #[async_trait]
    impl Interpreter for EchoInterpreter {
        async fn execute(
            &mut self,
            fragment: &str,
            deadline: Option<Duration>,
        ) -> InterpreterResult<CapturedResult> {
            let now = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_active.fetch_max(now, Ordering::SeqCst);
            if fragment == "slow" {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.counters.active.fetch_sub(1, Ordering::SeqCst);

            if fragment == "raise" {
                return Ok(CapturedResult::failure(
                    "partial\n",
                    "",
                    ExecutionFailure::new("ValueError", "boom"),
                ));
            }
            Ok(CapturedResult::success(format!("{fragment}\n"), format!("{deadline:?}")))
        }

        async fn get_variable(&mut self, name: &str) -> InterpreterResult<Option<Value>> {
            Ok(self.namespace.get(name).cloned())
        }

        async fn set_variable(&mut self, name: &str, value: Value) -> InterpreterResult<()> {
            if name.contains(' ') {
                return Err(InterpreterError::Variable {
                    name: name.to_owned(),
                    reason: "not an identifier".into(),
                });
            }
            self.namespace.insert(name.to_owned(), value);
            Ok(())
        }

        async fn variables(&mut self) -> InterpreterResult<Vec<String>> {
            Ok(self.namespace.keys().cloned().collect())
        }

        async fn reset(&mut self) -> InterpreterResult<()> {
            self.namespace.clear();
            Ok(())
        }

        async fn shutdown(&mut self) -> InterpreterResult<()> {
            self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn session_with(config: SessionConfig) -> (ExecutionSession, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let session = ExecutionSession::start(EchoInterpreter::boxed(&counters), config).unwrap();
        (session, counters)
    }

    fn session() -> (ExecutionSession, Arc<Counters>) {
        session_with(SessionConfig::default())
    }

    #[tokio::test]
    async fn run_returns_captured_output() {
        let (session, _) = session();
        assert_eq!(session.state(), SessionState::Ready);

        let result = session.run("print(1)").await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.stdout(), "print(1)\n");
        assert_eq!(session.executions(), 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn failures_leave_session_usable() {
        let (session, _) = session();

        let failed = session.run("raise").await.unwrap();
        assert_eq!(failed.stdout(), "partial\n");
        assert_eq!(failed.failure_details().unwrap().kind(), "ValueError");

        let next = session.run("ok").await.unwrap();
        assert!(next.is_success());
        assert_eq!(session.executions(), 2);
    }

    #[tokio::test]
    async fn default_deadline_applies_to_run() {
        let config = SessionConfig::default().with_default_deadline(Some(Duration::from_secs(2)));
        let (session, _) = session_with(config);

        let result = session.run("x").await.unwrap();
        assert_eq!(result.stderr(), "Some(2s)");

        let explicit = session
            .run_with_deadline("x", Some(Duration::from_millis(5)))
            .await
            .unwrap();
        assert_eq!(explicit.stderr(), "Some(5ms)");
    }

    #[tokio::test]
    async fn output_is_capped() {
        let (session, _) = session_with(SessionConfig::default().with_max_output_bytes(4));

        let result = session.run("abcdefgh").await.unwrap();
        assert!(result.stdout().starts_with("abcd\n[output truncated"));
    }

    #[tokio::test]
    async fn concurrent_runs_are_serialized() {
        let (session, counters) = session();
        let session = Arc::new(session);

        let first = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.run("slow").await }
        });
        let second = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.run("slow").await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(counters.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(session.executions(), 2);
    }

    #[tokio::test]
    async fn cancelled_run_returns_to_ready() {
        let (session, _) = session();

        let cancelled = tokio::time::timeout(Duration::from_millis(5), session.run("slow")).await;
        assert!(cancelled.is_err());
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.run("again").await.unwrap().is_success());
    }

    #[tokio::test]
    async fn variables_flow_through_the_interpreter() {
        let (session, _) = session();

        session.set_variable("x", json!(8)).await.unwrap();
        assert_eq!(session.get_variable("x").await.unwrap(), Some(json!(8)));
        assert_eq!(session.get_variable("y").await.unwrap(), None);
        assert_eq!(session.variables().await.unwrap(), ["x"]);
        assert!(matches!(
            session.set_variable("bad name", json!(1)).await,
            Err(SessionError::Interpreter(InterpreterError::Variable { .. }))
        ));

        session.reset().await.unwrap();
        assert!(session.variables().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let (session, counters) = session();

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Disposed);

        assert!(matches!(
            session.run("print(1)").await,
            Err(SessionError::Closed { id }) if id == session.id()
        ));
        assert!(matches!(
            session.get_variable("x").await,
            Err(SessionError::Closed { .. })
        ));
        assert!(matches!(session.reset().await, Err(SessionError::Closed { .. })));
    }

    #[tokio::test]
    async fn close_waits_for_in_flight_run() {
        let (session, counters) = session();
        let session = Arc::new(session);

        let running = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.run("slow").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.close().await.unwrap();
        let result = running.await.unwrap().unwrap();
        assert_eq!(result.stdout(), "slow\n");
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
    }
}
