//! Persistent code execution sessions.
//!
//! An [`ExecutionSession`] wraps one live interpreter whose namespace survives
//! between fragments. Output and errors come back as a [`CapturedResult`];
//! an exception in a fragment never ends the session. The shipped backend is
//! [`PythonInterpreter`], a `python3` child process driven over a
//! line-delimited JSON protocol.

#![warn(missing_docs, clippy::pedantic)]

pub mod error;
pub mod interpreter;
mod lifecycle;
pub mod manager;
mod outcome;
mod protocol;
pub mod python;
pub mod session;
pub mod support;

pub use error::{
    DispatchError, InterpreterError, InterpreterResult, SessionError, SessionResult,
};
pub use interpreter::{DEADLINE_KIND, EXITED_KIND, Interpreter, InterpreterFactory};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleResult, SessionEvent, SessionState};
pub use manager::SessionManager;
pub use outcome::{CapturedResult, ExecutionFailure, ExecutionStatus};
pub use python::{PythonFactory, PythonInterpreter};
pub use session::ExecutionSession;
pub use support::{RUN_PYTHON_REPL, SUPPORT_MODULE, dispatch};
