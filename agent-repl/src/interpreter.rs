//! Interpreter seam used by execution sessions.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::InterpreterResult;
use crate::outcome::CapturedResult;

/// Failure kind reported when a fragment exceeds its deadline.
pub const DEADLINE_KIND: &str = "DeadlineExceeded";

/// Failure kind reported when the interpreter died while running a fragment.
pub const EXITED_KIND: &str = "InterpreterExited";

/// A live interpreter owning one persistent namespace.
///
/// Implementations are driven by a single caller at a time; sessions
/// serialize access behind a lock.
#[async_trait]
pub trait Interpreter: Send {
    /// Runs `fragment` against the namespace and captures what it wrote.
    ///
    /// Exceptions raised by the fragment are reported in the returned
    /// [`CapturedResult`], not as an error.
    async fn execute(
        &mut self,
        fragment: &str,
        deadline: Option<Duration>,
    ) -> InterpreterResult<CapturedResult>;

    /// Reads a JSON-representable variable; `None` when it is unbound.
    async fn get_variable(&mut self, name: &str) -> InterpreterResult<Option<Value>>;

    /// Binds `name` to `value` in the namespace.
    async fn set_variable(&mut self, name: &str, value: Value) -> InterpreterResult<()>;

    /// Lists user-visible names bound in the namespace, sorted.
    async fn variables(&mut self) -> InterpreterResult<Vec<String>>;

    /// Clears the namespace without restarting the interpreter.
    async fn reset(&mut self) -> InterpreterResult<()>;

    /// Releases the interpreter. Further calls fail.
    async fn shutdown(&mut self) -> InterpreterResult<()>;
}

/// Creates interpreters for new sessions.
#[async_trait]
pub trait InterpreterFactory: Send + Sync {
    /// Starts a fresh interpreter with an empty namespace.
    async fn spawn(&self) -> InterpreterResult<Box<dyn Interpreter>>;
}
