//! Error types for interpreters and sessions.

use std::io;

use agent_primitives::SessionId;
use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Errors raised by an interpreter backend.
///
/// These describe the backend itself misbehaving. Exceptions raised by a
/// fragment are reported inside [`CapturedResult`](crate::CapturedResult).
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// The interpreter process could not be launched.
    #[error("failed to spawn interpreter `{program}`: {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The interpreter started but never answered its handshake.
    #[error("interpreter did not become ready: {reason}")]
    Startup {
        /// Why the handshake failed.
        reason: String,
    },
    /// Reading from or writing to the interpreter failed.
    #[error("interpreter i/o failed: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },
    /// A request could not be encoded.
    #[error("failed to encode interpreter request: {source}")]
    Encode {
        /// Underlying serde error.
        #[from]
        source: serde_json::Error,
    },
    /// The interpreter answered with something outside the protocol.
    #[error("interpreter protocol violation: {reason}")]
    Protocol {
        /// Description of the violation.
        reason: String,
    },
    /// The interpreter process went away.
    #[error("interpreter exited unexpectedly")]
    Exited,
    /// A variable could not be read or written.
    #[error("variable `{name}` rejected: {reason}")]
    Variable {
        /// Variable name.
        name: String,
        /// Why the interpreter refused it.
        reason: String,
    },
    /// The interpreter has been shut down and accepts no more requests.
    #[error("interpreter has been shut down")]
    ShutDown,
}

/// Result alias for interpreter operations.
pub type InterpreterResult<T> = Result<T, InterpreterError>;

/// Errors surfaced by [`ExecutionSession`](crate::ExecutionSession).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session was closed and accepts no further work.
    #[error("session {id} is closed")]
    Closed {
        /// Identifier of the closed session.
        id: SessionId,
    },
    /// No session is registered under the identifier.
    #[error("session {id} not found")]
    NotFound {
        /// Identifier that was looked up.
        id: SessionId,
    },
    /// Lifecycle transition failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Interpreter backend failed.
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised while dispatching a registered tool call to a session.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The registry rejected the call.
    #[error(transparent)]
    Call(#[from] agent_tools::CallError),
    /// The tool is registered but has no in-process implementation.
    #[error("tool `{name}` has no in-process implementation")]
    Unsupported {
        /// Tool name.
        name: String,
    },
    /// An argument passed the contract check but has the wrong shape.
    #[error("argument `{parameter}` is invalid: {reason}")]
    InvalidArgument {
        /// Parameter name.
        parameter: &'static str,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// The session failed while running the tool.
    #[error(transparent)]
    Session(#[from] SessionError),
}
